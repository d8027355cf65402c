//! Service catalog: the frozen id/port/timeout tables for the four body
//! services. All routing identity derives from these constants.

use std::time::Duration;

/// `(service_id, instance_id)`: the routing identity of a service instance.
pub type ServiceKey = (u16, u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: &'static str,
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub minor_version: u8,
    pub event_group: u16,
    /// Default TCP port for method request/response.
    pub default_port: u16,
}

impl ServiceSpec {
    pub const fn key(&self) -> ServiceKey {
        (self.service_id, self.instance_id)
    }
}

pub const WINDOW: ServiceSpec = ServiceSpec {
    name: "window",
    service_id: 0x1001,
    instance_id: 0x0001,
    major_version: 1,
    minor_version: 0,
    event_group: 0x0001,
    default_port: 30501,
};

pub const DOOR: ServiceSpec = ServiceSpec {
    name: "door",
    service_id: 0x1002,
    instance_id: 0x0001,
    major_version: 1,
    minor_version: 0,
    event_group: 0x0001,
    default_port: 30502,
};

pub const LIGHT: ServiceSpec = ServiceSpec {
    name: "light",
    service_id: 0x1003,
    instance_id: 0x0001,
    major_version: 1,
    minor_version: 0,
    event_group: 0x0001,
    default_port: 30503,
};

pub const SEAT: ServiceSpec = ServiceSpec {
    name: "seat",
    service_id: 0x1004,
    instance_id: 0x0001,
    major_version: 1,
    minor_version: 0,
    event_group: 0x0001,
    default_port: 30504,
};

pub const ALL_SERVICES: [ServiceSpec; 4] = [WINDOW, DOOR, LIGHT, SEAT];

/// Service discovery UDP port (provider side).
pub const SD_PORT: u16 = 30490;

pub mod window {
    pub const SET_WINDOW_POSITION: u16 = 0x0001;
    pub const CONTROL_WINDOW: u16 = 0x0002;
    pub const GET_WINDOW_POSITION: u16 = 0x0003;
    pub const ON_WINDOW_POSITION_CHANGED: u16 = 0x8001;
}

pub mod door {
    pub const SET_LOCK_STATE: u16 = 0x0001;
    pub const GET_LOCK_STATE: u16 = 0x0002;
    pub const ON_LOCK_STATE_CHANGED: u16 = 0x8001;
    pub const ON_DOOR_STATE_CHANGED: u16 = 0x8002;
}

pub mod light {
    pub const SET_HEADLIGHT_STATE: u16 = 0x0001;
    pub const SET_INDICATOR_STATE: u16 = 0x0002;
    pub const SET_POSITION_LIGHT_STATE: u16 = 0x0003;
    pub const ON_LIGHT_STATE_CHANGED: u16 = 0x8001;
}

pub mod seat {
    pub const ADJUST_SEAT: u16 = 0x0001;
    pub const RECALL_MEMORY_POSITION: u16 = 0x0002;
    pub const SAVE_MEMORY_POSITION: u16 = 0x0003;
    pub const ON_SEAT_POSITION_CHANGED: u16 = 0x8001;
    pub const ON_MEMORY_SAVE_CONFIRM: u16 = 0x8002;
}

pub mod timing {
    use super::Duration;

    /// Deadline for one outstanding method call.
    pub const METHOD_CALL: Duration = Duration::from_millis(5000);
    /// How long a client waits for a service to be discovered.
    pub const DISCOVERY: Duration = Duration::from_millis(10_000);
    /// TCP connect deadline toward an offered endpoint.
    pub const TCP_CONNECT: Duration = Duration::from_millis(3000);
    /// Cyclic offer announcement period.
    pub const OFFER_INTERVAL: Duration = Duration::from_millis(2000);
    /// Service is unavailable after this long without an offer.
    pub const OFFER_TTL: Duration = Duration::from_millis(3000);
    /// TTL carried in offer entries, in whole seconds.
    pub const OFFER_TTL_SECS: u32 = 3;
}

pub fn service_by_id(service_id: u16) -> Option<&'static ServiceSpec> {
    match service_id {
        id if id == WINDOW.service_id => Some(&WINDOW),
        id if id == DOOR.service_id => Some(&DOOR),
        id if id == LIGHT.service_id => Some(&LIGHT),
        id if id == SEAT.service_id => Some(&SEAT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_ids_are_distinct() {
        let mut ids: Vec<u16> = ALL_SERVICES.iter().map(|s| s.service_id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(service_by_id(0x1002), Some(&DOOR));
        assert_eq!(service_by_id(0x2000), None);
    }

    #[test]
    fn ports_follow_the_deployment_plan() {
        assert_eq!(WINDOW.default_port, 30501);
        assert_eq!(DOOR.default_port, 30502);
        assert_eq!(LIGHT.default_port, 30503);
        assert_eq!(SEAT.default_port, 30504);
    }
}
