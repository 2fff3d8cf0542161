//! # Serial Servo Bus
//!
//! Wire protocol for the half-duplex serial bus servos driving every joint.
//!
//! Every request is framed as:
//!
//! ```text
//! 0xFF 0xFF | id | len | instruction | params.. | checksum
//! ```
//!
//! where `len` is the number of parameters plus two, and the checksum is the
//! one's complement of the (wrapping) sum of every byte after the header.
//! Servos answer non-broadcast requests with a status packet:
//!
//! ```text
//! 0xFF 0xFF | id | len | status | data.. | checksum
//! ```
//!
//! A read which produces no bytes before the port's timeout is reported as
//! [`BusError::Timeout`]. Words are little endian, and positions use a sign
//! and magnitude encoding with the sign on bit 15.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use std::io::{self, Read, Write};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Start of every packet on the bus.
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Servo ID which addresses every servo on the bus. Broadcast packets are
/// never answered.
pub const BROADCAST_ID: u8 = 0xFE;

/// Maximum number of stray bytes tolerated before a response header.
const MAX_HEADER_SKIP: usize = 10;

/// Sign bit of an encoded position.
const SIGN_BIT: u16 = 1 << 15;

/// Servo memory table addresses.
pub mod reg {
    pub const TORQUE_ENABLE: u8 = 40;
    pub const ACC: u8 = 41;
    pub const GOAL_POSITION: u8 = 42;
    pub const PRESENT_POSITION: u8 = 56;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A servo bus on top of any byte stream.
///
/// The stream is expected to have a read timeout configured (a serial port
/// device, for instance), reads returning no data are treated as timeouts.
pub struct ServoBus<P> {
    port: P,
}

/// A validated status packet returned by a servo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    pub status: u8,
    pub data: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Instructions understood by the servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    SyncRead = 0x82,
    SyncWrite = 0x83,
}

/// Errors which can occur while talking to the servos.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("No response from servo {0} before the read timeout")]
    Timeout(u8),

    #[error(
        "Checksum mismatch in response from servo {id}: expected {expected:#04x}, \
        found {found:#04x}"
    )]
    Checksum { id: u8, expected: u8, found: u8 },

    #[error("Expected a response from servo {expected} but servo {found} replied")]
    WrongId { expected: u8, found: u8 },

    #[error("Response from servo {id} has length {len}, expected {expected}")]
    BadLength { id: u8, len: u8, expected: u8 },

    #[error("Servo {id} reported fault status {status:#04x}")]
    Fault { id: u8, status: u8 },

    #[error("Packet parameters too long ({0} bytes)")]
    PacketTooLong(usize),

    #[error("Serial port error: {0}")]
    Io(io::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the checksum of the bytes following the header.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build a complete request packet.
pub fn encode_packet(id: u8, instr: Instruction, params: &[u8]) -> Result<Vec<u8>, BusError> {
    if params.len() > (u8::MAX as usize) - 2 {
        return Err(BusError::PacketTooLong(params.len()));
    }

    let mut packet = Vec::with_capacity(params.len() + 6);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push(params.len() as u8 + 2);
    packet.push(instr as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));

    Ok(packet)
}

/// Encode a signed position into the servo's sign and magnitude word.
pub fn encode_position(position: i16) -> u16 {
    if position < 0 {
        ((-(position as i32)) as u16) | SIGN_BIT
    } else {
        position as u16
    }
}

/// Decode a sign and magnitude position word.
pub fn decode_position(word: u16) -> i16 {
    let magnitude = (word & !SIGN_BIT) as i16;
    if word & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P> ServoBus<P>
where
    P: Read + Write,
{
    /// Create a new bus on the given port.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Release the underlying port.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Check that a servo is present and healthy.
    pub fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.transact(id, Instruction::Ping, &[], 0).map(|_| ())
    }

    /// Move a servo to the given position immediately.
    pub fn write_position(
        &mut self,
        id: u8,
        position: i16,
        speed: u16,
        acc: u8,
    ) -> Result<(), BusError> {
        let params = position_block(position, speed, acc);
        self.transact(id, Instruction::Write, &params, 0).map(|_| ())
    }

    /// Stage a position on a servo, which will only move on the next
    /// [`ServoBus::action`].
    pub fn reg_write_position(
        &mut self,
        id: u8,
        position: i16,
        speed: u16,
        acc: u8,
    ) -> Result<(), BusError> {
        let params = position_block(position, speed, acc);
        self.transact(id, Instruction::RegWrite, &params, 0).map(|_| ())
    }

    /// Trigger every staged write on the bus at once.
    pub fn action(&mut self) -> Result<(), BusError> {
        self.transact(BROADCAST_ID, Instruction::Action, &[], 0).map(|_| ())
    }

    /// Enable or release the torque of a servo.
    pub fn set_torque(&mut self, id: u8, enable: bool) -> Result<(), BusError> {
        self.transact(
            id,
            Instruction::Write,
            &[reg::TORQUE_ENABLE, enable as u8],
            0,
        )
        .map(|_| ())
    }

    /// Read the present position of a servo.
    pub fn read_position(&mut self, id: u8) -> Result<i16, BusError> {
        match self.transact(id, Instruction::Read, &[reg::PRESENT_POSITION, 2], 2)? {
            Some(status) => Ok(decode_position(LittleEndian::read_u16(&status.data))),
            None => Err(BusError::Timeout(id)),
        }
    }

    /// Write goal positions to many servos with a single broadcast packet.
    pub fn sync_write_positions(&mut self, targets: &[(u8, i16)]) -> Result<(), BusError> {
        let mut params = Vec::with_capacity(2 + targets.len() * 3);
        params.push(reg::GOAL_POSITION);
        params.push(2);

        for (id, position) in targets {
            let mut word = [0u8; 2];
            LittleEndian::write_u16(&mut word, encode_position(*position));
            params.push(*id);
            params.extend_from_slice(&word);
        }

        self.transact(BROADCAST_ID, Instruction::SyncWrite, &params, 0)
            .map(|_| ())
    }

    /// Send a request and, for non-broadcast requests, wait for the status
    /// packet carrying `resp_len` bytes of data.
    fn transact(
        &mut self,
        id: u8,
        instr: Instruction,
        params: &[u8],
        resp_len: usize,
    ) -> Result<Option<StatusPacket>, BusError> {
        let packet = encode_packet(id, instr, params)?;

        trace!("Servo bus tx: {:02X?}", packet);

        self.port.write_all(&packet).map_err(BusError::Io)?;
        self.port.flush().map_err(BusError::Io)?;

        if id == BROADCAST_ID {
            return Ok(None);
        }

        self.read_status(id, resp_len).map(Some)
    }

    fn read_status(&mut self, id: u8, data_len: usize) -> Result<StatusPacket, BusError> {
        self.find_header(id)?;

        // id, len, status
        let mut head = [0u8; 3];
        self.read_into(id, &mut head)?;

        if head[0] != id {
            return Err(BusError::WrongId {
                expected: id,
                found: head[0],
            });
        }

        let expected_len = data_len as u8 + 2;
        if head[1] != expected_len {
            return Err(BusError::BadLength {
                id,
                len: head[1],
                expected: expected_len,
            });
        }

        let mut data = vec![0u8; data_len];
        self.read_into(id, &mut data)?;

        let mut found = [0u8; 1];
        self.read_into(id, &mut found)?;

        let mut body = head.to_vec();
        body.extend_from_slice(&data);
        let expected = checksum(&body);
        if expected != found[0] {
            return Err(BusError::Checksum {
                id,
                expected,
                found: found[0],
            });
        }

        if head[2] != 0 {
            return Err(BusError::Fault {
                id,
                status: head[2],
            });
        }

        Ok(StatusPacket {
            id,
            status: head[2],
            data,
        })
    }

    /// Consume bytes until a header is found.
    fn find_header(&mut self, id: u8) -> Result<(), BusError> {
        let mut prev = 0u8;
        let mut num_read = 0;

        loop {
            let byte = self.read_byte(id)?;
            num_read += 1;

            if prev == HEADER[0] && byte == HEADER[1] {
                return Ok(());
            }
            if num_read >= MAX_HEADER_SKIP + HEADER.len() {
                return Err(BusError::Timeout(id));
            }

            prev = byte;
        }
    }

    fn read_into(&mut self, id: u8, buf: &mut [u8]) -> Result<(), BusError> {
        for b in buf.iter_mut() {
            *b = self.read_byte(id)?;
        }
        Ok(())
    }

    fn read_byte(&mut self, id: u8) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];

        loop {
            match self.port.read(&mut buf) {
                Ok(1) => return Ok(buf[0]),
                Ok(_) => return Err(BusError::Timeout(id)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Err(BusError::Timeout(id))
                }
                Err(e) => return Err(BusError::Io(e)),
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Register block starting at `ACC`: acceleration, goal position, goal time
/// (unused, zero) and goal speed.
fn position_block(position: i16, speed: u16, acc: u8) -> [u8; 8] {
    let mut params = [0u8; 8];
    params[0] = reg::ACC;
    params[1] = acc;
    LittleEndian::write_u16(&mut params[2..4], encode_position(position));
    LittleEndian::write_u16(&mut params[6..8], speed);
    params
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    /// Loopback port which replays canned responses and records writes.
    struct MockPort {
        rx: Cursor<Vec<u8>>,
        tx: Vec<u8>,
    }

    impl MockPort {
        fn new(rx: Vec<u8>) -> Self {
            Self {
                rx: Cursor::new(rx),
                tx: Vec::new(),
            }
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn status(id: u8, status: u8, data: &[u8]) -> Vec<u8> {
        let mut body = vec![id, data.len() as u8 + 2, status];
        body.extend_from_slice(data);
        let sum = checksum(&body);
        let mut packet = HEADER.to_vec();
        packet.extend_from_slice(&body);
        packet.push(sum);
        packet
    }

    #[test]
    fn test_encode_packet() {
        assert_eq!(
            encode_packet(1, Instruction::Ping, &[]).unwrap(),
            vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]
        );

        // Checksum wraps
        let p = encode_packet(0xFE, Instruction::SyncWrite, &[0x2A, 0x02, 0x10]).unwrap();
        assert_eq!(p[3], 5);
        assert_eq!(*p.last().unwrap(), checksum(&p[2..p.len() - 1]));

        assert!(matches!(
            encode_packet(1, Instruction::Write, &[0u8; 254]),
            Err(BusError::PacketTooLong(254))
        ));
    }

    #[test]
    fn test_position_encoding() {
        assert_eq!(encode_position(100), 100);
        assert_eq!(encode_position(-100), 0x8064);
        assert_eq!(decode_position(0x8064), -100);
        assert_eq!(decode_position(encode_position(-2047)), -2047);
    }

    #[test]
    fn test_write_position_ack() {
        let mut bus = ServoBus::new(MockPort::new(status(3, 0, &[])));
        bus.write_position(3, -20, 1500, 50).unwrap();

        let port = bus.into_inner();
        assert_eq!(&port.tx[0..5], &[0xFF, 0xFF, 3, 10, Instruction::Write as u8]);
        assert_eq!(port.tx[5], reg::ACC);
        assert_eq!(port.tx[6], 50);
        assert_eq!(&port.tx[7..9], &[20, 0x80]);
        assert_eq!(&port.tx[11..13], &[0xDC, 0x05]);
    }

    #[test]
    fn test_read_position_with_junk() {
        let mut rx = vec![0x00; MAX_HEADER_SKIP];
        rx.extend(status(7, 0, &[0x00, 0x08]));
        let mut bus = ServoBus::new(MockPort::new(rx));
        assert_eq!(bus.read_position(7).unwrap(), 2048);

        let mut rx = vec![0x00; MAX_HEADER_SKIP + 1];
        rx.extend(status(7, 0, &[0x00, 0x08]));
        let mut bus = ServoBus::new(MockPort::new(rx));
        assert!(matches!(bus.read_position(7), Err(BusError::Timeout(7))));
    }

    #[test]
    fn test_bad_responses() {
        // No response at all
        let mut bus = ServoBus::new(MockPort::new(vec![]));
        assert!(matches!(bus.ping(1), Err(BusError::Timeout(1))));

        // Corrupted checksum
        let mut rx = status(1, 0, &[]);
        *rx.last_mut().unwrap() ^= 0x01;
        let mut bus = ServoBus::new(MockPort::new(rx));
        assert!(matches!(bus.ping(1), Err(BusError::Checksum { id: 1, .. })));

        // Truncated response
        let mut rx = status(1, 0, &[0x00, 0x08]);
        rx.truncate(5);
        let mut bus = ServoBus::new(MockPort::new(rx));
        assert!(matches!(bus.read_position(1), Err(BusError::Timeout(1))));

        // Fault status
        let mut bus = ServoBus::new(MockPort::new(status(1, 0x20, &[])));
        assert!(matches!(
            bus.set_torque(1, false),
            Err(BusError::Fault { id: 1, status: 0x20 })
        ));
    }

    #[test]
    fn test_broadcast_has_no_response() {
        let mut bus = ServoBus::new(MockPort::new(vec![]));
        bus.sync_write_positions(&[(1, 10), (2, -10)]).unwrap();
        bus.action().unwrap();

        let port = bus.into_inner();
        // (data len + 1) * ids + 4
        assert_eq!(port.tx[3], 3 * 2 + 4);
        assert_eq!(&port.tx[5..7], &[reg::GOAL_POSITION, 2]);
        assert_eq!(&port.tx[7..10], &[1, 10, 0]);
        assert_eq!(&port.tx[10..13], &[2, 10, 0x80]);
    }
}
