use std::fmt::{Display, Error, Formatter};

use crate::error::{ProbeError, ProbeResult};
use crate::properties::compliance_limit;
use crate::story::get_word;

/// The last field we read (static memory base) ends at offset 16
pub const MIN_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub release: u16,
    pub high_memory_base: u16,
    pub initial_pc: u16,
    pub dictionary: u16,
    pub object_table_addr: u16,
    pub global_variables: u16,
    pub static_memory_base: u16,
    /// Length of the buffer the header was read from
    pub file_len: usize,
}

/// Implausible header field relationships. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderAnomaly {
    UnknownVersion(u8),
    NotVersion3(u8),
    StaticBeyondFile { static_base: u16, file_len: usize },
    HighBeyondFile { high_base: u16, file_len: usize },
    StaticAboveHigh { static_base: u16, high_base: u16 },
    InitialPcOutside { initial_pc: u16, file_len: usize },
    ObjectTableOutside { addr: u16, file_len: usize },
    DictionaryOutside { addr: u16, file_len: usize },
}

impl Header {
    pub fn parse(bytes: &[u8]) -> ProbeResult<Header> {
        if bytes.len() < MIN_HEADER_LEN {
            return Err(ProbeError::Format {
                len: bytes.len(),
                needed: MIN_HEADER_LEN,
            });
        }

        Ok(Header {
            version: bytes[0],
            release: get_word(bytes, 2),
            high_memory_base: get_word(bytes, 4),
            initial_pc: get_word(bytes, 6),
            dictionary: get_word(bytes, 8),
            object_table_addr: get_word(bytes, 10),
            global_variables: get_word(bytes, 12),
            static_memory_base: get_word(bytes, 14),
            file_len: bytes.len(),
        })
    }

    pub fn anomalies(&self) -> Vec<HeaderAnomaly> {
        let mut found = Vec::new();
        let file_len = self.file_len;

        if !(1..=8).contains(&self.version) {
            found.push(HeaderAnomaly::UnknownVersion(self.version));
        } else if self.version != 3 {
            found.push(HeaderAnomaly::NotVersion3(self.version));
        }
        if self.static_memory_base as usize > file_len {
            found.push(HeaderAnomaly::StaticBeyondFile {
                static_base: self.static_memory_base,
                file_len,
            });
        }
        if self.high_memory_base as usize > file_len {
            found.push(HeaderAnomaly::HighBeyondFile {
                high_base: self.high_memory_base,
                file_len,
            });
        }
        if self.static_memory_base > self.high_memory_base {
            found.push(HeaderAnomaly::StaticAboveHigh {
                static_base: self.static_memory_base,
                high_base: self.high_memory_base,
            });
        }
        if self.initial_pc as usize >= file_len {
            found.push(HeaderAnomaly::InitialPcOutside {
                initial_pc: self.initial_pc,
                file_len,
            });
        }
        if self.object_table_addr as usize >= file_len {
            found.push(HeaderAnomaly::ObjectTableOutside {
                addr: self.object_table_addr,
                file_len,
            });
        }
        if self.dictionary as usize >= file_len {
            found.push(HeaderAnomaly::DictionaryOutside {
                addr: self.dictionary,
                file_len,
            });
        }
        found
    }
}

impl Display for HeaderAnomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            HeaderAnomaly::UnknownVersion(v) => write!(f, "unknown Z-code version {v}"),
            HeaderAnomaly::NotVersion3(v) => write!(
                f,
                "version {v} file: the property analyzer targets v3, so the v{v} size limit of {} bytes applies instead",
                compliance_limit(*v)
            ),
            HeaderAnomaly::StaticBeyondFile {
                static_base,
                file_len,
            } => write!(
                f,
                "static memory base {static_base:#06x} beyond file length {file_len:#06x}"
            ),
            HeaderAnomaly::HighBeyondFile {
                high_base,
                file_len,
            } => write!(
                f,
                "high memory base {high_base:#06x} beyond file length {file_len:#06x}"
            ),
            HeaderAnomaly::StaticAboveHigh {
                static_base,
                high_base,
            } => write!(
                f,
                "static memory base {static_base:#06x} above high memory base {high_base:#06x}"
            ),
            HeaderAnomaly::InitialPcOutside {
                initial_pc,
                file_len,
            } => write!(
                f,
                "initial PC {initial_pc:#06x} outside file (length {file_len:#06x})"
            ),
            HeaderAnomaly::ObjectTableOutside { addr, file_len } => write!(
                f,
                "object table {addr:#06x} outside file (length {file_len:#06x})"
            ),
            HeaderAnomaly::DictionaryOutside { addr, file_len } => write!(
                f,
                "dictionary {addr:#06x} outside file (length {file_len:#06x})"
            ),
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "Z-code version:           {}
Release number:           {}
Size of resident memory:  {:#06x}
Start PC:                 {:#06x}
Dictionary address:       {:#06x}
Object table address:     {:#06x}
Global variables address: {:#06x}
Size of dynamic memory:   {:#06x}
File size:                {:#06x}
",
            self.version,
            self.release,
            self.high_memory_base,
            self.initial_pc,
            self.dictionary,
            self.object_table_addr,
            self.global_variables,
            self.static_memory_base,
            self.file_len,
        )
    }
}
