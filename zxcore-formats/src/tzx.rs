//! **TZX** tape container utilities.
//!
//! A full TZX player needs a pulse-accurate state machine for every block kind (loop/call/
//! jump control flow, CSW and generalized data blocks, direct recordings). What's implemented
//! here instead is the common case real-world `.tzx` files overwhelmingly use: Standard Speed
//! Data (`0x10`) and Turbo Speed Data (`0x11`) blocks, which carry the same "flag, data,
//! checksum" payload a `.tap` chunk does and so can be re-emitted through
//! [`crate::tap::TapChunkWriter`] directly. Every other block ID is skipped using its
//! documented length field rather than rejected, so a loader doesn't choke the first time it
//! meets a `GroupStart`/`Text`/`Archive` block it doesn't otherwise care about.
use core::num::NonZeroU32;
use core::convert::TryFrom;
use std::io::{self, Read, Write, Seek, Error, ErrorKind, Result as IoResult};

use super::tap::TapChunkWriter;
use super::ReadExactEx;

pub trait TzxChunk {
    type PulseIter: Iterator<Item=NonZeroU32>;
    fn id(&self) -> TzxId;
    fn len(&self) -> usize;
    fn pulse_iter(&self) -> Self::PulseIter;
    fn as_slice(&self) -> &[u8];
    fn write_to_tap<W: Write + Seek>(&self, rd: &mut TapChunkWriter<W>) -> io::Result<Option<usize>>;
}

macro_rules! tzx_id {
    ($($id:ident = $n:literal),*) => {
        #[repr(u8)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum TzxId {
            $($id = $n),*
        }

        impl TryFrom<u8> for TzxId {
            type Error = &'static str;
            fn try_from(id: u8) -> Result<Self, Self::Error> {
                match id {
                    $($n => Ok(TzxId::$id),)*
                    _ => Err("Unknown TZX ID")
                }
            }
        }

    };
}

tzx_id! {
    StandardSpeed    = 0x10,
    TurboSpeed       = 0x11,
    PureTone         = 0x12,
    SeqOfPulses      = 0x13,
    PureData         = 0x14,
    DirectRec        = 0x15,
    CswRecording     = 0x18,
    Generalized      = 0x19,
    Pause            = 0x20,
    GroupStart       = 0x21,
    GroupEnd         = 0x22,
    Jump             = 0x23,
    LoopStart        = 0x24,
    LoopEnd          = 0x25,
    CallSeq          = 0x26,
    Return           = 0x27,
    Select           = 0x28,
    StopIn48k        = 0x2A,
    SetLevel         = 0x2B,
    Text             = 0x30,
    Message          = 0x31,
    Archive          = 0x32,
    Hardware         = 0x33,
    Custom           = 0x35,
    Glue             = 0x5A
}

impl From<TzxId> for u8 {
    fn from(id: TzxId) -> u8 {
        id as u8
    }
}

const TZX_MAGIC: &[u8; 8] = b"ZXTape!\x1A";

/// A decoded Standard or Turbo Speed Data block: the two kinds whose payload is a plain
/// `.tap`-style chunk (flag byte, data bytes, checksum byte).
pub struct DataBlock {
    pub id: TzxId,
    pub pause_ms: u16,
    pub data: Vec<u8>,
}

fn skip_bytes<R: Read>(rd: &mut R, mut count: u64) -> IoResult<()> {
    let mut buf = [0u8; 256];
    while count > 0 {
        let take = count.min(buf.len() as u64) as usize;
        rd.read_exact(&mut buf[..take])?;
        count -= take as u64;
    }
    Ok(())
}

fn read_u16le<R: Read>(rd: &mut R) -> IoResult<u16> {
    let mut b = [0u8; 2];
    rd.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

fn read_u24le<R: Read>(rd: &mut R) -> IoResult<u32> {
    let mut b = [0u8; 3];
    rd.read_exact(&mut b)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

fn read_u32le<R: Read>(rd: &mut R) -> IoResult<u32> {
    let mut b = [0u8; 4];
    rd.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

/// Verifies the 8-byte `"ZXTape!\x1A"` signature and consumes the 2-byte version that follows
/// it, leaving the stream positioned at the first block.
pub fn read_tzx_header<R: Read>(rd: &mut R) -> IoResult<(u8, u8)> {
    let mut magic = [0u8; 8];
    rd.read_exact(&mut magic)?;
    if &magic != TZX_MAGIC {
        return Err(Error::new(ErrorKind::InvalidData, "TZX: missing 'ZXTape!' signature"));
    }
    let mut version = [0u8; 2];
    rd.read_exact(&mut version)?;
    Ok((version[0], version[1]))
}

/// What [`next_tzx_block`] found: a data-bearing block, a recognized-but-skipped one, or the
/// end of the stream.
pub enum TzxBlockEvent {
    Data(DataBlock),
    Skipped(TzxId),
    Eof,
}

/// Reads one block. Standard/Turbo Speed Data blocks come back as `Data`; every other
/// recognized block is consumed and reported as `Skipped` so the caller can tell that apart
/// from genuinely running out of stream (`Eof`).
pub fn next_tzx_block<R: Read>(rd: &mut R) -> IoResult<TzxBlockEvent> {
    let mut id_buf = [0u8; 1];
    if !rd.read_exact_or_none(&mut id_buf)? {
        return Ok(TzxBlockEvent::Eof);
    }
    let id = TzxId::try_from(id_buf[0])
        .map_err(|_| Error::new(ErrorKind::InvalidData, "TZX: unrecognized block ID"))?;
    match id {
        TzxId::StandardSpeed => {
            let pause_ms = read_u16le(rd)?;
            let len = read_u16le(rd)? as usize;
            let mut data = vec![0u8; len];
            rd.read_exact(&mut data)?;
            Ok(TzxBlockEvent::Data(DataBlock { id, pause_ms, data }))
        }
        TzxId::TurboSpeed => {
            skip_bytes(rd, 2 + 2 + 2 + 2 + 2 + 2)?; // pilot/sync1/sync2/zero/one/pilot-count
            let _used_bits = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] };
            let pause_ms = read_u16le(rd)?;
            let len = read_u24le(rd)? as usize;
            let mut data = vec![0u8; len];
            rd.read_exact(&mut data)?;
            Ok(TzxBlockEvent::Data(DataBlock { id, pause_ms, data }))
        }
        TzxId::PureTone => { skip_bytes(rd, 4)?; Ok(TzxBlockEvent::Skipped(id)) }
        TzxId::SeqOfPulses => {
            let n = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] as u64 };
            skip_bytes(rd, n * 2)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::PureData => {
            skip_bytes(rd, 2 + 2)?; // zero/one pulse lengths
            let _used_bits = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] };
            skip_bytes(rd, 2)?; // pause
            let len = read_u24le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::DirectRec => {
            skip_bytes(rd, 2 + 2)?; // tstates-per-sample, pause
            let _used_bits = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] };
            let len = read_u24le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::CswRecording | TzxId::Generalized => {
            let len = read_u32le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Pause => { skip_bytes(rd, 2)?; Ok(TzxBlockEvent::Skipped(id)) }
        TzxId::GroupStart => {
            let len = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] as u64 };
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::GroupEnd | TzxId::Return | TzxId::LoopEnd => Ok(TzxBlockEvent::Skipped(id)),
        TzxId::Jump | TzxId::LoopStart => { skip_bytes(rd, 2)?; Ok(TzxBlockEvent::Skipped(id)) }
        TzxId::CallSeq => {
            let n = read_u16le(rd)? as u64;
            skip_bytes(rd, n * 2)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Select => {
            let len = read_u16le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::StopIn48k => { skip_bytes(rd, 4)?; Ok(TzxBlockEvent::Skipped(id)) }
        TzxId::SetLevel => {
            let len = read_u32le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Text => {
            let len = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] as u64 };
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Message => {
            skip_bytes(rd, 1)?; // display time
            let len = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] as u64 };
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Archive => {
            let len = read_u16le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Hardware => {
            let n = { let mut b = [0u8; 1]; rd.read_exact(&mut b)?; b[0] as u64 };
            skip_bytes(rd, n * 3)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Custom => {
            skip_bytes(rd, 10)?; // identifier
            let len = read_u32le(rd)? as u64;
            skip_bytes(rd, len)?;
            Ok(TzxBlockEvent::Skipped(id))
        }
        TzxId::Glue => { skip_bytes(rd, 9)?; Ok(TzxBlockEvent::Skipped(id)) }
    }
}

/// Converts every Standard/Turbo Speed Data block in a `.tzx` stream into `.tap` chunks
/// written through `writer`, skipping every other block kind. Returns the number of data
/// chunks written.
pub fn convert_tzx_to_tap<R: Read, W: Write + Seek>(
    mut src: R,
    writer: &mut TapChunkWriter<W>,
) -> io::Result<usize> {
    read_tzx_header(&mut src)?;
    let mut written = 0;
    loop {
        match next_tzx_block(&mut src)? {
            TzxBlockEvent::Data(block) => {
                writer.write_chunk(block.data)?;
                written += 1;
            }
            TzxBlockEvent::Skipped(_) => continue,
            TzxBlockEvent::Eof => break,
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use crate::tap::write_tap;

    fn standard_speed_block(data: &[u8]) -> Vec<u8> {
        let mut out = vec![TzxId::StandardSpeed as u8];
        out.extend_from_slice(&100u16.to_le_bytes()); // pause
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    fn sample_tzx_stream() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(TZX_MAGIC);
        out.push(1);
        out.push(20);
        out.extend(standard_speed_block(&[0xFF, 1, 2, 3, 0xFD]));
        // a GroupStart/GroupEnd pair the reader should skip without losing its place
        out.push(TzxId::GroupStart as u8);
        out.push(4);
        out.extend_from_slice(b"demo");
        out.push(TzxId::GroupEnd as u8);
        out.extend(standard_speed_block(&[0x00, 9, 9]));
        out
    }

    #[test]
    fn rejects_a_stream_without_the_zxtape_signature() {
        let mut bytes = sample_tzx_stream();
        bytes[0] = b'X';
        assert!(read_tzx_header(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn skips_group_markers_and_reads_both_data_blocks() {
        let mut src = Cursor::new(sample_tzx_stream());
        read_tzx_header(&mut src).unwrap();

        let first = match next_tzx_block(&mut src).unwrap() {
            TzxBlockEvent::Data(b) => b,
            _ => panic!("expected a data block"),
        };
        assert_eq!(first.data, vec![0xFF, 1, 2, 3, 0xFD]);

        match next_tzx_block(&mut src).unwrap() {
            TzxBlockEvent::Skipped(TzxId::GroupStart) => {}
            _ => panic!("expected GroupStart to be skipped"),
        }
        match next_tzx_block(&mut src).unwrap() {
            TzxBlockEvent::Skipped(TzxId::GroupEnd) => {}
            _ => panic!("expected GroupEnd to be skipped"),
        }

        let second = match next_tzx_block(&mut src).unwrap() {
            TzxBlockEvent::Data(b) => b,
            _ => panic!("expected a second data block"),
        };
        assert_eq!(second.data, vec![0x00, 9, 9]);

        assert!(matches!(next_tzx_block(&mut src).unwrap(), TzxBlockEvent::Eof));
    }

    #[test]
    fn convert_tzx_to_tap_writes_only_the_data_blocks() {
        let mut writer = write_tap(Cursor::new(Vec::new())).unwrap();
        let written = convert_tzx_to_tap(Cursor::new(sample_tzx_stream()), &mut writer).unwrap();
        assert_eq!(written, 2);
    }
}
