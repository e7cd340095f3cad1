// Wire protocol DTOs and conversions for the arena WebSocket.
//
// Every frame is `{"event": <name>, "data": <payload>}`. Inbound payloads are
// validated here so the world only ever sees well-formed domain values.

use crate::domain::systems::economy::DropReport;
use crate::domain::{Point, Resource, RoundKind, Shot, Tank};
use crate::use_cases::{
    ConnId, GameEvent, ShotLaunch, TankMovement, TankSpawn, WorldEvent, WorldSnapshot,
};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Largest text frame the server will try to decode.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024;

// Largest integer an f64 carries exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed client message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode server message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },
}

/// Messages clients send to the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    // Asks for a snapshot; the payload is the client's own connection id.
    Join(String),
    SpawnTank(SpawnTankDto),
    MoveTank(MoveTankDto),
    FireShot(FireShotDto),
    MoveShot(MoveShotDto),
    ShotExpired(ShotRefDto),
    ResourcePickedUp(ResourcePickupDto),
    ResourceDropped(ResourceDto),
    ResetAll,
}

/// Messages the server sends to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Identity { connid: String },
    Snapshot(SnapshotDto),
    TankRoster(Vec<(String, TankDto)>),
    TankMoved(MoveTankDto),
    ShotSpawned(ShotDto),
    TankDestroyed(String),
    TankDisconnected(String),
    ResourcePickedUp(ResourcePickupDto),
    ResourceDropped(ResourceDto),
    WorldReset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordsDto {
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDto {
    #[serde(deserialize_with = "lenient_count")]
    pub rid: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub coords: CoordsDto,
    #[serde(deserialize_with = "lenient_rounds")]
    pub rounds: u32,
}

impl From<&Resource> for ResourceDto {
    fn from(resource: &Resource) -> Self {
        Self {
            rid: resource.id,
            kind: resource.kind.tag().to_string(),
            coords: CoordsDto {
                x: resource.position.x,
                y: resource.position.y,
            },
            rounds: resource.rounds,
        }
    }
}

impl From<ResourceDto> for Resource {
    fn from(dto: ResourceDto) -> Self {
        Self {
            id: dto.rid,
            kind: RoundKind::from_tag(&dto.kind),
            position: Point::new(dto.coords.x, dto.coords.y),
            rounds: dto.rounds,
        }
    }
}

impl From<ResourceDto> for DropReport {
    fn from(dto: ResourceDto) -> Self {
        Self {
            resource_id: dto.rid,
            kind: RoundKind::from_tag(&dto.kind),
            position: Point::new(dto.coords.x, dto.coords.y),
            rounds: dto.rounds,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TankDto {
    pub tankid: String,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    #[serde(rename = "tankColor")]
    pub tank_color: Value,
    pub playername: String,
    pub health: u8,
    pub destroyed: bool,
    // Connected flag.
    pub on: bool,
    pub ammo: Option<ResourceDto>,
}

impl From<&Tank> for TankDto {
    fn from(tank: &Tank) -> Self {
        Self {
            tankid: tank.id.clone(),
            x: tank.position.x,
            y: tank.position.y,
            heading: tank.heading,
            tank_color: tank.color.clone(),
            playername: tank.player_name.clone(),
            health: tank.health(),
            destroyed: tank.is_destroyed(),
            on: tank.connected,
            ammo: tank.equipped.as_ref().map(ResourceDto::from),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpawnTankDto {
    pub tankid: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub heading: f64,
    #[serde(rename = "tankColor", default)]
    pub tank_color: Value,
    #[serde(default)]
    pub playername: String,
    #[serde(default)]
    pub ammo: Option<ResourceDto>,
}

impl From<SpawnTankDto> for TankSpawn {
    fn from(dto: SpawnTankDto) -> Self {
        Self {
            tank_id: dto.tankid,
            position: Point::new(dto.x, dto.y),
            heading: dto.heading,
            color: dto.tank_color,
            player_name: dto.playername,
            ammo: dto.ammo.map(Resource::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveTankDto {
    pub tankid: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub heading: f64,
    #[serde(rename = "tankColor", default)]
    pub tank_color: Value,
}

impl From<MoveTankDto> for TankMovement {
    fn from(dto: MoveTankDto) -> Self {
        Self {
            tank_id: dto.tankid,
            position: Point::new(dto.x, dto.y),
            heading: dto.heading,
            color: dto.tank_color,
        }
    }
}

impl From<TankMovement> for MoveTankDto {
    fn from(movement: TankMovement) -> Self {
        Self {
            tankid: movement.tank_id,
            x: movement.position.x,
            y: movement.position.y,
            heading: movement.heading,
            tank_color: movement.color,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FireShotDto {
    pub tankid: String,
    // Per-tank shot sequence number.
    #[serde(deserialize_with = "lenient_count")]
    pub id: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub angle: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl From<FireShotDto> for ShotLaunch {
    fn from(dto: FireShotDto) -> Self {
        Self {
            tank_id: dto.tankid,
            sequence: dto.id,
            position: Point::new(dto.x, dto.y),
            angle: dto.angle,
            kind: RoundKind::from_tag(&dto.kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShotDto {
    pub shotid: String,
    pub tankid: String,
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub power: u32,
}

impl From<&Shot> for ShotDto {
    fn from(shot: &Shot) -> Self {
        Self {
            shotid: shot.id.clone(),
            tankid: shot.owner.clone(),
            id: shot.sequence,
            x: shot.position.x,
            y: shot.position.y,
            angle: shot.angle,
            kind: shot.kind.tag(),
            power: shot.power(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveShotDto {
    pub shotid: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShotRefDto {
    pub shotid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcePickupDto {
    pub tankid: String,
    #[serde(deserialize_with = "lenient_count")]
    pub rid: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotDto {
    pub resource: Vec<(u64, ResourceDto)>,
    pub opponents: Vec<(String, TankDto)>,
    pub flying: Vec<(String, ShotDto)>,
}

fn roster_pairs(tanks: &[Tank]) -> Vec<(String, TankDto)> {
    tanks
        .iter()
        .map(|tank| (tank.id.clone(), TankDto::from(tank)))
        .collect()
}

impl From<&WorldSnapshot> for SnapshotDto {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            resource: snapshot
                .resources
                .iter()
                .map(|resource| (resource.id, ResourceDto::from(resource)))
                .collect(),
            opponents: roster_pairs(&snapshot.opponents),
            flying: snapshot
                .flying
                .iter()
                .map(|shot| (shot.id.clone(), ShotDto::from(shot)))
                .collect(),
        }
    }
}

impl From<&WorldEvent> for ServerMessage {
    fn from(event: &WorldEvent) -> Self {
        match event {
            WorldEvent::Snapshot(snapshot) => ServerMessage::Snapshot(snapshot.into()),
            WorldEvent::TankRoster(tanks) => ServerMessage::TankRoster(roster_pairs(tanks)),
            WorldEvent::TankMoved(movement) => ServerMessage::TankMoved(movement.clone().into()),
            WorldEvent::ShotSpawned(shot) => ServerMessage::ShotSpawned(shot.into()),
            WorldEvent::TankDestroyed(id) => ServerMessage::TankDestroyed(id.clone()),
            WorldEvent::TankDisconnected(id) => ServerMessage::TankDisconnected(id.clone()),
            WorldEvent::ResourcePickedUp {
                tank_id,
                resource_id,
            } => ServerMessage::ResourcePickedUp(ResourcePickupDto {
                tankid: tank_id.clone(),
                rid: *resource_id,
            }),
            WorldEvent::ResourceDropped(resource) => {
                ServerMessage::ResourceDropped(resource.into())
            }
            WorldEvent::WorldReset => ServerMessage::WorldReset,
        }
    }
}

impl ClientMessage {
    /// Binds the message to the connection it arrived on.
    pub fn into_event(self, conn_id: ConnId) -> GameEvent {
        match self {
            ClientMessage::Join(player) => GameEvent::Join { conn_id, player },
            ClientMessage::SpawnTank(dto) => GameEvent::SpawnTank {
                conn_id,
                spawn: dto.into(),
            },
            ClientMessage::MoveTank(dto) => GameEvent::MoveTank {
                conn_id,
                movement: dto.into(),
            },
            ClientMessage::FireShot(dto) => GameEvent::FireShot {
                conn_id,
                launch: dto.into(),
            },
            ClientMessage::MoveShot(dto) => GameEvent::MoveShot {
                shot_id: dto.shotid,
                position: Point::new(dto.x, dto.y),
            },
            ClientMessage::ShotExpired(dto) => GameEvent::ShotExpired {
                shot_id: dto.shotid,
            },
            ClientMessage::ResourcePickedUp(dto) => GameEvent::PickUpResource {
                tank_id: dto.tankid,
                resource_id: dto.rid,
            },
            ClientMessage::ResourceDropped(dto) => GameEvent::DropResource(dto.into()),
            ClientMessage::ResetAll => GameEvent::ResetAll { conn_id },
        }
    }
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge {
            len: text.len(),
            max: MAX_MESSAGE_BYTES,
        });
    }
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// Accepts a JSON number or a numeric string; rejects NaN and infinities.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n,
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got {text:?}")))?,
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom("number must be finite"))
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT_INTEGER {
        return Err(de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u64)
}

fn lenient_rounds<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_count(deserializer)?;
    u32::try_from(value).map_err(|_| de::Error::custom(format!("round count {value} too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<ClientMessage, ProtocolError> {
        decode_client_message(&value.to_string())
    }

    #[test]
    fn decodes_spawn_with_string_numbers() {
        let msg = decode(json!({
            "event": "spawnTank",
            "data": {
                "tankid": "abc",
                "x": "120.5",
                "y": 80,
                "heading": "0",
                "tankColor": "#00ff00",
                "playername": "Ada"
            }
        }))
        .expect("spawn should decode");

        let GameEvent::SpawnTank { conn_id, spawn } = msg.into_event(3) else {
            panic!("expected a spawn event");
        };
        assert_eq!(conn_id, 3);
        assert_eq!(spawn.tank_id, "abc");
        assert_eq!(spawn.position, Point::new(120.5, 80.0));
        assert_eq!(spawn.color, json!("#00ff00"));
        assert!(spawn.ammo.is_none());
    }

    #[test]
    fn rejects_non_numeric_and_non_finite_coordinates() {
        for bad in [json!("north"), json!("NaN"), json!("inf"), json!(null), json!([1])] {
            let result = decode(json!({
                "event": "moveShot",
                "data": { "shotid": "a>1", "x": bad, "y": 0 }
            }));
            assert!(
                matches!(result, Err(ProtocolError::Decode(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn fire_shot_needs_a_whole_sequence_number() {
        let fire = |id: serde_json::Value| {
            decode(json!({
                "event": "fireShot",
                "data": { "tankid": "T1", "id": id, "x": 1, "y": 2, "angle": 0.5, "type": "S" }
            }))
        };

        let ok = fire(json!("7")).expect("numeric string id");
        let GameEvent::FireShot { launch, .. } = ok.into_event(1) else {
            panic!("expected a fire event");
        };
        assert_eq!(launch.sequence, 7);
        assert_eq!(launch.kind, RoundKind::Split);

        assert!(fire(json!(-1)).is_err());
        assert!(fire(json!(1.5)).is_err());
    }

    #[test]
    fn unit_events_need_no_payload() {
        let msg = decode(json!({ "event": "resetAll" })).expect("resetAll should decode");
        assert!(matches!(
            msg.into_event(5),
            GameEvent::ResetAll { conn_id: 5 }
        ));
    }

    #[test]
    fn unknown_events_and_oversized_frames_fail() {
        assert!(matches!(
            decode(json!({ "event": "teleport", "data": {} })),
            Err(ProtocolError::Decode(_))
        ));

        let huge = format!(
            "{{\"event\":\"join\",\"data\":\"{}\"}}",
            "x".repeat(MAX_MESSAGE_BYTES)
        );
        assert!(matches!(
            decode_client_message(&huge),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn resource_drop_decodes_into_a_report() {
        let msg = decode(json!({
            "event": "resourceDropped",
            "data": { "rid": 12, "type": "B", "coords": { "x": 10, "y": "20" }, "rounds": "4" }
        }))
        .expect("drop should decode");

        let GameEvent::DropResource(report) = msg.into_event(1) else {
            panic!("expected a drop");
        };
        assert_eq!(
            report,
            DropReport {
                resource_id: 12,
                kind: RoundKind::Ballistic,
                position: Point::new(10.0, 20.0),
                rounds: 4,
            }
        );
    }

    #[test]
    fn tank_encodes_with_wire_field_names() {
        let mut tank = Tank::new("T1", Point::new(1.0, 2.0), 0.5, "Ada", json!("#fff"));
        tank.equip(Resource::fresh(4, RoundKind::Rapid, Point::new(150.0, 480.0)));

        let encoded = serde_json::to_value(TankDto::from(&tank)).expect("tank should encode");

        assert_eq!(
            encoded,
            json!({
                "tankid": "T1",
                "x": 1.0,
                "y": 2.0,
                "heading": 0.5,
                "tankColor": "#fff",
                "playername": "Ada",
                "health": 10,
                "destroyed": false,
                "on": true,
                "ammo": { "rid": 4, "type": "R", "coords": { "x": 150.0, "y": 480.0 }, "rounds": 25 }
            })
        );
    }

    #[test]
    fn snapshot_encodes_registries_as_sorted_pairs() {
        let snapshot = WorldSnapshot {
            resources: vec![
                Resource::fresh(1, RoundKind::Rapid, Point::new(200.0, 200.0)),
                Resource::fresh(2, RoundKind::Split, Point::new(600.0, 150.0)),
            ],
            opponents: Vec::new(),
            flying: vec![Shot::new("T1", 3, Point::new(5.0, 5.0), 0.0, RoundKind::Ballistic)],
        };

        let msg = ServerMessage::from(&WorldEvent::Snapshot(snapshot));
        let encoded: serde_json::Value =
            serde_json::from_str(&encode_server_message(&msg).expect("encode"))
                .expect("valid json");

        assert_eq!(encoded["event"], "snapshot");
        assert_eq!(encoded["data"]["resource"][0][0], 1);
        assert_eq!(encoded["data"]["resource"][1][1]["type"], "S");
        assert_eq!(encoded["data"]["opponents"], json!([]));
        assert_eq!(encoded["data"]["flying"][0][0], "T1>3");
        assert_eq!(encoded["data"]["flying"][0][1]["power"], 8);
    }

    #[test]
    fn server_events_use_camel_case_names() {
        let reset = encode_server_message(&ServerMessage::from(&WorldEvent::WorldReset))
            .expect("encode");
        assert_eq!(reset, r#"{"event":"worldReset"}"#);

        let gone = encode_server_message(&ServerMessage::from(&WorldEvent::TankDisconnected(
            "T9".to_string(),
        )))
        .expect("encode");
        assert_eq!(gone, r#"{"event":"tankDisconnected","data":"T9"}"#);

        let identity = encode_server_message(&ServerMessage::Identity {
            connid: "42".to_string(),
        })
        .expect("encode");
        assert_eq!(identity, r#"{"event":"identity","data":{"connid":"42"}}"#);
    }
}
