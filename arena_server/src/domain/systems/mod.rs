// World rules triggered by client reports: shot hits and resource pickups.

pub mod economy;
pub mod hits;
