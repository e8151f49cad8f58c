//! iRacing SDK binary layout, as stored in `.ibt` recordings
//!
//! A 48-byte header, up to four variable-buffer descriptors, a table of
//! 144-byte variable headers, the session-info YAML and the raw sample
//! buffers. Every parser here works on byte slices.

use anyhow::{bail, ensure, Context, Result};
use pedal_core::source::{FieldError, FieldValue};
use std::collections::HashMap;

pub const HEADER_LEN: usize = 48;
pub const VAR_BUF_OFFSET: usize = 48;
pub const VAR_BUF_LEN: usize = 16;
pub const MAX_BUFS: usize = 4;
pub const DISK_SUB_HEADER_OFFSET: usize = 112;
pub const DISK_SUB_HEADER_LEN: usize = 32;
pub const VAR_HEADER_LEN: usize = 144;

// ============================================================================
// Binary format types
// ============================================================================

/// Variable data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Char = 0,
    Bool = 1,
    Int = 2,
    BitField = 3,
    Float = 4,
    Double = 5,
}

impl VarType {
    pub fn from_i32(val: i32) -> Result<Self> {
        match val {
            0 => Ok(VarType::Char),
            1 => Ok(VarType::Bool),
            2 => Ok(VarType::Int),
            3 => Ok(VarType::BitField),
            4 => Ok(VarType::Float),
            5 => Ok(VarType::Double),
            _ => bail!("Unknown variable type: {}", val),
        }
    }

    /// Size in bytes for a single element of this type
    pub fn element_size(&self) -> usize {
        match self {
            VarType::Char | VarType::Bool => 1,
            VarType::Int | VarType::BitField | VarType::Float => 4,
            VarType::Double => 8,
        }
    }
}

/// Variable buffer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarBuf {
    pub tick_count: i32,
    pub buf_offset: i32,
}

/// Main header plus its buffer descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub ver: i32,
    pub status: i32,
    pub tick_rate: i32,
    pub session_info_update: i32,
    pub session_info_len: i32,
    pub session_info_offset: i32,
    pub num_vars: i32,
    pub var_header_offset: i32,
    pub num_buf: i32,
    pub buf_len: i32,
    pub var_bufs: Vec<VarBuf>,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= VAR_BUF_OFFSET + MAX_BUFS * VAR_BUF_LEN,
            "Header truncated: {} bytes",
            bytes.len()
        );

        let num_buf = le_i32(bytes, 32)?;
        ensure!(
            (0..=MAX_BUFS as i32).contains(&num_buf),
            "Invalid buffer count: {}",
            num_buf
        );

        let var_bufs = (0..num_buf as usize)
            .map(|i| {
                let base = VAR_BUF_OFFSET + i * VAR_BUF_LEN;
                Ok(VarBuf {
                    tick_count: le_i32(bytes, base)?,
                    buf_offset: le_i32(bytes, base + 4)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Header {
            ver: le_i32(bytes, 0)?,
            status: le_i32(bytes, 4)?,
            tick_rate: le_i32(bytes, 8)?,
            session_info_update: le_i32(bytes, 12)?,
            session_info_len: le_i32(bytes, 16)?,
            session_info_offset: le_i32(bytes, 20)?,
            num_vars: le_i32(bytes, 24)?,
            var_header_offset: le_i32(bytes, 28)?,
            num_buf,
            buf_len: le_i32(bytes, 36)?,
            var_bufs,
        })
    }

    /// The session-info YAML, up to its first NUL
    pub fn session_info<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        let region = region(
            bytes,
            self.session_info_offset,
            self.session_info_len as usize,
        )
        .context("Session info out of bounds")?;
        let end = region.iter().position(|&b| b == 0).unwrap_or(region.len());
        Ok(&region[..end])
    }
}

/// Disk sub-header, present in `.ibt` files only
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSubHeader {
    pub session_start_date: i64,
    pub session_start_time: f64,
    pub session_end_time: f64,
    pub session_lap_count: i32,
    pub session_record_count: i32,
}

impl DiskSubHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= DISK_SUB_HEADER_OFFSET + DISK_SUB_HEADER_LEN,
            "Disk sub-header truncated"
        );
        let base = DISK_SUB_HEADER_OFFSET;
        Ok(DiskSubHeader {
            session_start_date: i64::from_le_bytes(bytes[base..base + 8].try_into()?),
            session_start_time: f64::from_le_bytes(bytes[base + 8..base + 16].try_into()?),
            session_end_time: f64::from_le_bytes(bytes[base + 16..base + 24].try_into()?),
            session_lap_count: le_i32(bytes, base + 24)?,
            session_record_count: le_i32(bytes, base + 28)?,
        })
    }
}

/// A single variable header
#[derive(Debug, Clone, PartialEq)]
pub struct VarHeader {
    pub var_type: VarType,
    pub offset: i32,
    pub count: i32,
    pub count_as_time: bool,
    pub name: String,
    pub desc: String,
    pub unit: String,
}

impl VarHeader {
    fn parse(buf: &[u8]) -> Result<Self> {
        Ok(VarHeader {
            var_type: VarType::from_i32(le_i32(buf, 0)?)?,
            offset: le_i32(buf, 4)?,
            count: le_i32(buf, 8)?,
            count_as_time: buf[12] != 0,
            name: read_null_terminated_string(&buf[16..48]),
            desc: read_null_terminated_string(&buf[48..112]),
            unit: read_null_terminated_string(&buf[112..144]),
        })
    }
}

// ============================================================================
// Variable layout: name lookup over a sample buffer
// ============================================================================

/// Parsed variable table with a by-name index
#[derive(Debug, Clone, Default)]
pub struct VarLayout {
    headers: Vec<VarHeader>,
    index: HashMap<String, usize>,
}

impl VarLayout {
    /// Parse `header.num_vars` variable headers out of `bytes`
    pub fn parse(bytes: &[u8], header: &Header) -> Result<Self> {
        let count = usize::try_from(header.num_vars).context("Negative variable count")?;
        let table = region(bytes, header.var_header_offset, count * VAR_HEADER_LEN)
            .context("Variable header table out of bounds")?;

        let headers = table
            .chunks_exact(VAR_HEADER_LEN)
            .enumerate()
            .map(|(i, buf)| {
                VarHeader::parse(buf).with_context(|| format!("Failed to read variable header {}", i))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_headers(headers))
    }

    pub fn from_headers(headers: Vec<VarHeader>) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, vh)| (vh.name.clone(), i))
            .collect();
        Self { headers, index }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Read one scalar variable from a sample buffer
    pub fn read(&self, name: &str, sample: &[u8]) -> Result<FieldValue, FieldError> {
        let vh = self
            .index
            .get(name)
            .map(|&i| &self.headers[i])
            .ok_or_else(|| FieldError::Missing(name.to_string()))?;

        if vh.count != 1 {
            return Err(FieldError::TypeMismatch {
                name: name.to_string(),
                expected: "scalar",
            });
        }

        usize::try_from(vh.offset)
            .ok()
            .and_then(|offset| read_scalar_value(sample, offset, vh.var_type))
            .ok_or_else(|| FieldError::Missing(name.to_string()))
    }
}

// ============================================================================
// Binary reading helpers
// ============================================================================

fn le_i32(buf: &[u8], offset: usize) -> Result<i32> {
    let bytes = buf
        .get(offset..offset + 4)
        .with_context(|| format!("Read past end at offset {}", offset))?;
    Ok(i32::from_le_bytes(bytes.try_into()?))
}

/// `len` bytes at `offset`, if entirely inside `bytes`
pub fn region(bytes: &[u8], offset: i32, len: usize) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    bytes.get(start..start.checked_add(len)?)
}

fn read_null_terminated_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).to_string()
}

fn read_scalar_value(buf: &[u8], offset: usize, var_type: VarType) -> Option<FieldValue> {
    let bytes = buf.get(offset..offset.checked_add(var_type.element_size())?)?;
    let value = match var_type {
        VarType::Char => FieldValue::Int(i32::from(bytes[0])),
        VarType::Bool => FieldValue::Bool(bytes[0] != 0),
        VarType::Int => FieldValue::Int(i32::from_le_bytes(bytes.try_into().ok()?)),
        VarType::BitField => FieldValue::BitField(u32::from_le_bytes(bytes.try_into().ok()?)),
        VarType::Float => FieldValue::Float(f32::from_le_bytes(bytes.try_into().ok()?)),
        VarType::Double => FieldValue::Double(f64::from_le_bytes(bytes.try_into().ok()?)),
    };
    Some(value)
}
