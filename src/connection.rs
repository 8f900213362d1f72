//! Edge-triggered connection-state tracking.
//!
//! A [`ConnectionTracker`] remembers whether a link was up on the last poll
//! and only produces a [`LinkEvent`] when that changes. An outage lasting
//! hours therefore yields one "lost" line and one "regained" line, whatever
//! the poll interval.
//!
//! Three trackers run per process (see [`crate::pipeline::LinkStates`]): the
//! sensor link, the database link, and sensor data validity.

// ---

/// Which link a tracker watches. Only affects the log wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// HTTP link to the sensor, labelled by address or host.
    Sensor(String),
    /// HTTP link to InfluxDB.
    Database,
    /// Whether the sensor is returning usable (non-warm-up) data.
    SensorData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// A state change worth one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Lost(Link),
    Regained(Link),
}

impl LinkEvent {
    pub fn message(&self) -> String {
        match self {
            LinkEvent::Lost(Link::Sensor(addr)) => format!("Cannot connect to sensor: {addr}"),
            LinkEvent::Regained(Link::Sensor(addr)) => format!("Connected to sensor: {addr}"),
            LinkEvent::Lost(Link::Database) => "Lost connection to InfluxDB.".to_string(),
            LinkEvent::Regained(Link::Database) => "Connected to InfluxDB.".to_string(),
            LinkEvent::Lost(Link::SensorData(addr)) => {
                format!("No valid data from sensor {addr}; it may still be warming up")
            }
            LinkEvent::Regained(Link::SensorData(addr)) => {
                format!("Receiving valid data from sensor {addr}")
            }
        }
    }

    /// Emit the event: ERROR for a lost link, INFO for a regained one.
    pub fn log(&self) {
        match self {
            LinkEvent::Lost(_) => tracing::error!("{}", self.message()),
            LinkEvent::Regained(_) => tracing::info!("{}", self.message()),
        }
    }
}

/// Two-state tracker for one link.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    link: Link,
    state: ConnectionState,
    last_event: Option<LinkEvent>,
}

impl ConnectionTracker {
    /// New tracker, optimistically `Connected`.
    pub fn new(link: Link) -> Self {
        Self {
            link,
            state: ConnectionState::Connected,
            last_event: None,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Event produced by the most recent [`report`](Self::report), if any.
    pub fn last_event(&self) -> Option<&LinkEvent> {
        self.last_event.as_ref()
    }

    /// Force `Disconnected` without an event, so the next success is
    /// reported as a transition.
    pub fn force_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Record the outcome of one attempt. Returns an event only on a state
    /// change.
    pub fn report(&mut self, success: bool) -> Option<LinkEvent> {
        // ---
        let (next, event) = match (self.state, success) {
            (ConnectionState::Connected, true) => (ConnectionState::Connected, None),
            (ConnectionState::Connected, false) => (
                ConnectionState::Disconnected,
                Some(LinkEvent::Lost(self.link.clone())),
            ),
            (ConnectionState::Disconnected, false) => (ConnectionState::Disconnected, None),
            (ConnectionState::Disconnected, true) => (
                ConnectionState::Connected,
                Some(LinkEvent::Regained(self.link.clone())),
            ),
        };
        self.state = next;
        self.last_event = event.clone();
        event
    }

    /// [`report`](Self::report), logging the event if there is one. Returns
    /// whether the state changed.
    pub fn report_and_log(&mut self, success: bool) -> bool {
        match self.report(success) {
            Some(event) => {
                event.log();
                true
            }
            None => false,
        }
    }
}
