//! Typed payloads and their wire codec.
//!
//! Every payload is the concatenation of its fields in declaration order,
//! fixed-width little-endian, no padding, no framing. Enumerations are one
//! byte and decode strictly: an out-of-domain tag is a malformed payload,
//! never a preserved raw value. Percent and position fields are plain
//! integers on the wire; their domain is enforced by the service handlers so
//! an out-of-range value can still be answered with a `Fail` result.

use std::convert::TryFrom;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload truncated at byte {at}")]
    Truncated { at: usize },
    #[error("{what} tag 0x{value:02x} out of domain")]
    OutOfDomain { what: &'static str, value: u8 },
    #[error("trailing bytes after payload")]
    TrailingBytes,
}

/// Symmetric encode/decode for one payload type. `decode` is strict and
/// total: it rejects short buffers, out-of-domain tags, and trailing bytes,
/// and never retains the input.
pub trait WirePayload: Sized {
    fn encode_to(&self, out: &mut Vec<u8>);
    fn decode(buf: &[u8]) -> Result<Self, CodecError>;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        let b = self
            .buf
            .get(self.pos)
            .copied()
            .ok_or(CodecError::Truncated { at: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.u8()? as i8)
    }

    fn tag<T>(&mut self) -> Result<T, CodecError>
    where
        T: TryFrom<u8, Error = CodecError>,
    {
        T::try_from(self.u8()?)
    }

    fn finish(self) -> Result<(), CodecError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes)
        }
    }
}

macro_rules! u8_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = CodecError;

            fn try_from(raw: u8) -> Result<Self, CodecError> {
                match raw {
                    $($value => Ok($name::$variant),)+
                    value => Err(CodecError::OutOfDomain { what: $label, value }),
                }
            }
        }
    };
}

u8_enum!(
    /// Door/window corner. All four corners are always present.
    Position, "position" {
        FrontLeft = 0,
        FrontRight = 1,
        RearLeft = 2,
        RearRight = 3,
    }
);

u8_enum!(LockCommand, "lockCommand" { Lock = 0, Unlock = 1 });
u8_enum!(LockState, "lockState" { Unlocked = 0, Locked = 1 });
u8_enum!(DoorState, "doorState" { Closed = 0, Open = 1 });
u8_enum!(WindowCommand, "windowCommand" { MoveUp = 0, MoveDown = 1, Stop = 2 });
u8_enum!(HeadlightState, "headlightState" { Off = 0, LowBeam = 1, HighBeam = 2 });
u8_enum!(IndicatorState, "indicatorState" { Off = 0, Left = 1, Right = 2, Hazard = 3 });
u8_enum!(PositionLightState, "positionLightState" { Off = 0, On = 1 });
u8_enum!(LightType, "lightType" { Headlight = 0, Indicator = 1, PositionLight = 2 });
u8_enum!(SeatAxis, "seatAxis" { ForeAft = 0, Recline = 1 });
u8_enum!(SeatDirection, "seatDirection" { Positive = 0, Negative = 1, Stop = 2 });
u8_enum!(OpResult, "result" { Fail = 0, Success = 1 });

impl LightType {
    /// Stable name used on the JSON surface.
    pub fn as_str(self) -> &'static str {
        match self {
            LightType::Headlight => "headlight",
            LightType::Indicator => "indicator",
            LightType::PositionLight => "position_light",
        }
    }
}

impl SeatAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            SeatAxis::ForeAft => "fore_aft",
            SeatAxis::Recline => "recline",
        }
    }
}

// ---------------------------------------------------------------------------
// Door service payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLockStateReq {
    pub door_id: Position,
    pub command: LockCommand,
}

impl WirePayload for SetLockStateReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
        out.push(self.command as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetLockStateReq {
            door_id: c.tag()?,
            command: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLockStateResp {
    pub door_id: Position,
    pub result: OpResult,
}

impl WirePayload for SetLockStateResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetLockStateResp {
            door_id: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetLockStateReq {
    pub door_id: Position,
}

impl WirePayload for GetLockStateReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = GetLockStateReq { door_id: c.tag()? };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetLockStateResp {
    pub door_id: Position,
    pub lock_state: LockState,
}

impl WirePayload for GetLockStateResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
        out.push(self.lock_state as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = GetLockStateResp {
            door_id: c.tag()?,
            lock_state: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnLockStateChanged {
    pub door_id: Position,
    pub lock_state: LockState,
}

impl WirePayload for OnLockStateChanged {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
        out.push(self.lock_state as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnLockStateChanged {
            door_id: c.tag()?,
            lock_state: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnDoorStateChanged {
    pub door_id: Position,
    pub door_state: DoorState,
}

impl WirePayload for OnDoorStateChanged {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.door_id as u8);
        out.push(self.door_state as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnDoorStateChanged {
            door_id: c.tag()?,
            door_state: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Window service payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetWindowPositionReq {
    pub window_id: Position,
    /// Target percent. Range is enforced by the handler, not the codec.
    pub position: u8,
}

impl WirePayload for SetWindowPositionReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.position);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetWindowPositionReq {
            window_id: c.tag()?,
            position: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetWindowPositionResp {
    pub window_id: Position,
    pub result: OpResult,
}

impl WirePayload for SetWindowPositionResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetWindowPositionResp {
            window_id: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWindowReq {
    pub window_id: Position,
    pub command: WindowCommand,
}

impl WirePayload for ControlWindowReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.command as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = ControlWindowReq {
            window_id: c.tag()?,
            command: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWindowResp {
    pub window_id: Position,
    pub result: OpResult,
}

impl WirePayload for ControlWindowResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = ControlWindowResp {
            window_id: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetWindowPositionReq {
    pub window_id: Position,
}

impl WirePayload for GetWindowPositionReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = GetWindowPositionReq {
            window_id: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetWindowPositionResp {
    pub window_id: Position,
    pub position: u8,
}

impl WirePayload for GetWindowPositionResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.position);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = GetWindowPositionResp {
            window_id: c.tag()?,
            position: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnWindowPositionChanged {
    pub window_id: Position,
    pub position: u8,
}

impl WirePayload for OnWindowPositionChanged {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.window_id as u8);
        out.push(self.position);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnWindowPositionChanged {
            window_id: c.tag()?,
            position: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Light service payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeadlightStateReq {
    pub command: HeadlightState,
}

impl WirePayload for SetHeadlightStateReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.command as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetHeadlightStateReq { command: c.tag()? };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeadlightStateResp {
    pub new_state: HeadlightState,
    pub result: OpResult,
}

impl WirePayload for SetHeadlightStateResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.new_state as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetHeadlightStateResp {
            new_state: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetIndicatorStateReq {
    pub command: IndicatorState,
}

impl WirePayload for SetIndicatorStateReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.command as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetIndicatorStateReq { command: c.tag()? };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetIndicatorStateResp {
    pub new_state: IndicatorState,
    pub result: OpResult,
}

impl WirePayload for SetIndicatorStateResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.new_state as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetIndicatorStateResp {
            new_state: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPositionLightStateReq {
    pub command: PositionLightState,
}

impl WirePayload for SetPositionLightStateReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.command as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetPositionLightStateReq { command: c.tag()? };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPositionLightStateResp {
    pub new_state: PositionLightState,
    pub result: OpResult,
}

impl WirePayload for SetPositionLightStateResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.new_state as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SetPositionLightStateResp {
            new_state: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

/// `state` is the raw value of whichever light enum `light_type` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnLightStateChanged {
    pub light_type: LightType,
    pub state: u8,
}

impl WirePayload for OnLightStateChanged {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.light_type as u8);
        out.push(self.state);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnLightStateChanged {
            light_type: c.tag()?,
            state: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Seat service payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustSeatReq {
    pub axis: SeatAxis,
    pub direction: SeatDirection,
}

impl WirePayload for AdjustSeatReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.axis as u8);
        out.push(self.direction as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = AdjustSeatReq {
            axis: c.tag()?,
            direction: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustSeatResp {
    pub axis: SeatAxis,
    pub result: OpResult,
}

impl WirePayload for AdjustSeatResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.axis as u8);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = AdjustSeatResp {
            axis: c.tag()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveMemoryPositionReq {
    /// Preset slot, valid range 1..=3. Enforced at the edge and again by the
    /// handler; the codec carries any byte.
    pub preset_id: u8,
}

impl WirePayload for SaveMemoryPositionReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.preset_id);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SaveMemoryPositionReq {
            preset_id: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveMemoryPositionResp {
    pub preset_id: u8,
    pub result: OpResult,
}

impl WirePayload for SaveMemoryPositionResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.preset_id);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = SaveMemoryPositionResp {
            preset_id: c.u8()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallMemoryPositionReq {
    pub preset_id: u8,
}

impl WirePayload for RecallMemoryPositionReq {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.preset_id);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = RecallMemoryPositionReq {
            preset_id: c.u8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallMemoryPositionResp {
    pub preset_id: u8,
    pub result: OpResult,
}

impl WirePayload for RecallMemoryPositionResp {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.preset_id);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = RecallMemoryPositionResp {
            preset_id: c.u8()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}

/// Fore/aft positions are signed (−100..=100); recline re-uses the same
/// field with its 0..=90 domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnSeatPositionChanged {
    pub axis: SeatAxis,
    pub position: i8,
}

impl WirePayload for OnSeatPositionChanged {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.axis as u8);
        out.push(self.position as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnSeatPositionChanged {
            axis: c.tag()?,
            position: c.i8()?,
        };
        c.finish()?;
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnMemorySaveConfirm {
    pub preset_id: u8,
    pub result: OpResult,
}

impl WirePayload for OnMemorySaveConfirm {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.push(self.preset_id);
        out.push(self.result as u8);
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        let v = OnMemorySaveConfirm {
            preset_id: c.u8()?,
            result: c.tag()?,
        };
        c.finish()?;
        Ok(v)
    }
}
