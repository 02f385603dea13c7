//! Strict parser for `DKSH` container bytes.

use crate::error::{DkshError, Result};
use crate::format::{DkshHeader, ProgramHeader, DKSH_MAGIC};

/// A parsed `DKSH` container, borrowing the underlying bytes.
///
/// Parsing validates every declared offset and size before use: the control
/// section must lie within the buffer and the program table within the
/// control section. Accessors never panic.
#[derive(Debug, Clone)]
pub struct DkshFile<'a> {
    bytes: &'a [u8],
    header: DkshHeader,
    programs: Vec<ProgramHeader>,
}

impl<'a> DkshFile<'a> {
    /// Parses a container from `bytes`.
    ///
    /// The input is treated as **untrusted**: malformed data yields a
    /// [`DkshError`], never a panic or an out-of-bounds read.
    pub fn parse(bytes: &'a [u8]) -> Result<DkshFile<'a>> {
        let header = DkshHeader::parse(bytes)?;
        if header.magic != DKSH_MAGIC {
            return Err(DkshError::BadMagic {
                found: header.magic,
                expected: DKSH_MAGIC,
            });
        }
        if header.header_size != DkshHeader::SIZE as u32 {
            return Err(DkshError::UnsupportedHeaderSize(header.header_size));
        }

        let control_size = header.control_size as usize;
        if control_size < DkshHeader::SIZE || control_size > bytes.len() {
            return Err(DkshError::OutOfBounds {
                what: "control section",
                offset: 0,
                len: control_size,
                available: bytes.len(),
            });
        }

        let programs_off = header.programs_off as usize;
        let table_len = (header.num_programs as usize)
            .checked_mul(ProgramHeader::SIZE)
            .ok_or(DkshError::OffsetOverflow)?;
        let table_end = programs_off
            .checked_add(table_len)
            .ok_or(DkshError::OffsetOverflow)?;
        if programs_off < DkshHeader::SIZE || table_end > control_size {
            return Err(DkshError::OutOfBounds {
                what: "program table",
                offset: programs_off,
                len: table_len,
                available: control_size,
            });
        }

        let mut programs = Vec::with_capacity(header.num_programs as usize);
        for idx in 0..header.num_programs as usize {
            let off = programs_off + idx * ProgramHeader::SIZE;
            programs.push(ProgramHeader::parse(&bytes[off..off + ProgramHeader::SIZE])?);
        }

        Ok(DkshFile {
            bytes,
            header,
            programs,
        })
    }

    /// The fixed container header.
    pub fn header(&self) -> &DkshHeader {
        &self.header
    }

    /// Program descriptors in table order.
    pub fn programs(&self) -> &[ProgramHeader] {
        &self.programs
    }

    /// The code section bytes actually present in the buffer.
    ///
    /// [`DkshHeader::code_size`] declares the rounded size the loader
    /// allocates; the buffer may end earlier, in which case the missing tail
    /// is don't-care and loaders zero it.
    pub fn code(&self) -> &'a [u8] {
        &self.bytes[self.header.control_size as usize..]
    }
}
