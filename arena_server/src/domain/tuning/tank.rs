/// Health a tank spawns with. Hits force health straight to zero.
pub const MAX_HEALTH: u8 = 10;
