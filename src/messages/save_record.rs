use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::NodeId;

/// Application record carried by SAVE frames and appended by the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub device_id: NodeId,
    pub hostname: String,
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub leader: NodeId,
}

impl Display for SaveRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device_id = {} | hostname = {} | ip = {} | timestamp = {} | leader = {}",
            self.device_id,
            self.hostname,
            self.ip,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.leader
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn record_layout() {
        let record = SaveRecord {
            device_id: 3,
            hostname: "peer-3".to_string(),
            ip: "10.0.0.3".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            leader: 5,
        };

        assert_eq!(
            record.to_string(),
            "device_id = 3 | hostname = peer-3 | ip = 10.0.0.3 | timestamp = 2024-01-01T00:00:00.000Z | leader = 5"
        );
    }
}
