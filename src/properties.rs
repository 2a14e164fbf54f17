//! Object table and property list walker
//!
//! Object table layout:
//! - 31 property defaults (62 bytes) at the object table address
//! - 9-byte object entries after them; the last two bytes of an entry point
//!   at the object's property table
//! - a property table starts with the name length in words, then the name,
//!   then property entries in descending number order, ended by a 0 byte
use crate::header::Header;
use crate::story::{get_byte, get_word};
use crate::text;
use log::{debug, warn};
use std::fmt::{Display, Error, Formatter};

pub const PROPERTY_DEFAULTS_LEN: usize = 62;
pub const OBJECT_ENTRY_SIZE: usize = 9;
pub const MAX_OBJECTS: usize = 100;
pub const MAX_PROPERTIES_PER_OBJECT: usize = 50;
pub const BASIC_MAX_SIZE: usize = 8;
pub const EXTENDED_MAX_SIZE: usize = 64;

/// Property size header format, selected per entry by the top bit of its
/// first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyEncoding {
    /// One header byte
    Basic,
    /// Two header bytes; the second carries the size
    Extended,
}

impl PropertyEncoding {
    pub fn select(size_byte: u8) -> Self {
        if size_byte & 0x80 != 0 {
            PropertyEncoding::Extended
        } else {
            PropertyEncoding::Basic
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            PropertyEncoding::Basic => 1,
            PropertyEncoding::Extended => 2,
        }
    }

    pub fn max_size(&self) -> usize {
        match self {
            PropertyEncoding::Basic => BASIC_MAX_SIZE,
            PropertyEncoding::Extended => EXTENDED_MAX_SIZE,
        }
    }
}

/// Largest property size the file's version permits. Versions 1-3 only
/// define the one-byte header.
pub fn compliance_limit(version: u8) -> usize {
    if version <= 3 {
        PropertyEncoding::Basic.max_size()
    } else {
        PropertyEncoding::Extended.max_size()
    }
}

/// A decoded property size header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyHeader {
    pub encoding: PropertyEncoding,
    pub number: u8,
    pub size: usize,
    pub size_byte: u8,
    /// Raw size field of an extended header before 0 is read as 64
    pub raw_size_field: u8,
}

impl PropertyHeader {
    /// Decode the header at `addr`; `None` for the list terminator
    pub fn decode(memory: &[u8], addr: usize) -> Option<PropertyHeader> {
        let size_byte = get_byte(memory, addr);
        if size_byte == 0 {
            return None;
        }

        let encoding = PropertyEncoding::select(size_byte);
        let header = match encoding {
            PropertyEncoding::Basic => {
                // prop num in bottom 5 bits, size - 1 in top 3 bits
                let raw = (size_byte >> 5) & 0x07;
                PropertyHeader {
                    encoding,
                    number: size_byte & 0x1F,
                    size: raw as usize + 1,
                    size_byte,
                    raw_size_field: raw,
                }
            }
            PropertyEncoding::Extended => {
                let raw = get_byte(memory, addr + 1) & 0x3F;
                PropertyHeader {
                    encoding,
                    number: size_byte & 0x3F,
                    size: if raw == 0 { 64 } else { raw as usize },
                    size_byte,
                    raw_size_field: raw,
                }
            }
        };
        Some(header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub object: u16,
    pub number: u8,
    pub size: usize,
    pub data: Vec<u8>,
    /// Address of the size byte
    pub address: usize,
    pub encoding: PropertyEncoding,
}

impl PropertyEntry {
    /// Byte or word value for 1- and 2-byte properties
    pub fn value(&self) -> Option<u16> {
        match self.data.as_slice() {
            [b] => Some(*b as u16),
            [high, low] => Some(((*high as u16) << 8) | *low as u16),
            _ => None,
        }
    }
}

/// A property whose size exceeds what the file's version permits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub object: u16,
    pub property: u8,
    pub size: usize,
    pub size_byte: u8,
    pub address: usize,
}

/// Findings that do not break the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyAnomaly {
    TableOutOfBounds { object: u16, addr: usize },
    ZeroSizeField { object: u16, property: u8, address: usize },
    PropertyNumberZero { object: u16, address: usize },
    OutOfOrder { object: u16, property: u8, previous: u8, address: usize },
    DataTruncated { object: u16, property: u8, address: usize },
    UnterminatedList { object: u16 },
    PropertyCapReached { object: u16 },
    ObjectEntryTruncated { object: u16, entry_addr: usize },
    ObjectCapReached,
}

impl Display for PropertyAnomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            PropertyAnomaly::TableOutOfBounds { object, addr } => write!(
                f,
                "Object #{object}: property table address {addr:#06x} out of bounds"
            ),
            PropertyAnomaly::ZeroSizeField {
                object,
                property,
                address,
            } => write!(
                f,
                "Object #{object}, Property #{property}: size field 0 at {address:#06x} (read as 64)"
            ),
            PropertyAnomaly::PropertyNumberZero { object, address } => {
                write!(f, "Object #{object}: property number 0 at {address:#06x}")
            }
            PropertyAnomaly::OutOfOrder {
                object,
                property,
                previous,
                address,
            } => write!(
                f,
                "Object #{object}: property #{property} at {address:#06x} follows #{previous} (not descending)"
            ),
            PropertyAnomaly::DataTruncated {
                object,
                property,
                address,
            } => write!(
                f,
                "Object #{object}, Property #{property}: data at {address:#06x} runs past end of file"
            ),
            PropertyAnomaly::UnterminatedList { object } => {
                write!(f, "Object #{object}: property list runs past end of file")
            }
            PropertyAnomaly::PropertyCapReached { object } => write!(
                f,
                "Object #{object}: stopped after {MAX_PROPERTIES_PER_OBJECT} properties"
            ),
            PropertyAnomaly::ObjectEntryTruncated { object, entry_addr } => write!(
                f,
                "Object #{object}: entry at {entry_addr:#06x} runs past end of file"
            ),
            PropertyAnomaly::ObjectCapReached => {
                write!(f, "Reached safety limit of {MAX_OBJECTS} objects")
            }
        }
    }
}

/// One decoded property table: the object name and its properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTable {
    pub address: usize,
    pub name_words: u8,
    pub name: String,
    pub properties: Vec<PropertyEntry>,
    pub violations: Vec<Violation>,
    pub anomalies: Vec<PropertyAnomaly>,
}

impl PropertyTable {
    /// Walk the property table at `table_addr`. Sizes above `limit` are
    /// recorded as violations.
    pub fn walk(
        memory: &[u8],
        object: u16,
        table_addr: usize,
        limit: usize,
    ) -> PropertyTable {
        let mut table = PropertyTable {
            address: table_addr,
            name_words: 0,
            name: String::new(),
            properties: Vec::new(),
            violations: Vec::new(),
            anomalies: Vec::new(),
        };

        if table_addr >= memory.len() {
            debug!("Object #{} property table {:#06x} out of bounds", object, table_addr);
            table.anomalies.push(PropertyAnomaly::TableOutOfBounds {
                object,
                addr: table_addr,
            });
            return table;
        }

        // Name: first byte is length in words
        table.name_words = memory[table_addr];
        let name_start = table_addr + 1;
        let name_end = name_start + table.name_words as usize * 2;
        table.name = text::decode(&memory[name_start..name_end.min(memory.len())]);

        debug!(
            "Object #{}: name '{}' ({} words), properties start at {:#06x}",
            object, table.name, table.name_words, name_end
        );

        let mut addr = name_end;
        let mut previous: Option<u8> = None;

        loop {
            if addr >= memory.len() {
                table
                    .anomalies
                    .push(PropertyAnomaly::UnterminatedList { object });
                break;
            }

            let header = match PropertyHeader::decode(memory, addr) {
                Some(header) => header,
                None => break,
            };

            if table.properties.len() >= MAX_PROPERTIES_PER_OBJECT {
                table
                    .anomalies
                    .push(PropertyAnomaly::PropertyCapReached { object });
                break;
            }

            debug!(
                "  Property #{}: size_byte={:#04x}, size={} bytes ({:?})",
                header.number, header.size_byte, header.size, header.encoding
            );

            if header.number == 0 {
                table
                    .anomalies
                    .push(PropertyAnomaly::PropertyNumberZero { object, address: addr });
            }
            if let Some(prev) = previous {
                if header.number >= prev {
                    table.anomalies.push(PropertyAnomaly::OutOfOrder {
                        object,
                        property: header.number,
                        previous: prev,
                        address: addr,
                    });
                }
            }
            if header.encoding == PropertyEncoding::Extended && header.raw_size_field == 0 {
                table.anomalies.push(PropertyAnomaly::ZeroSizeField {
                    object,
                    property: header.number,
                    address: addr,
                });
            }
            if header.size > limit {
                warn!(
                    "Object #{}, Property #{}: size {} exceeds maximum of {}",
                    object, header.number, header.size, limit
                );
                table.violations.push(Violation {
                    object,
                    property: header.number,
                    size: header.size,
                    size_byte: header.size_byte,
                    address: addr,
                });
            }

            let data_start = addr + header.encoding.header_len();
            let data_end = data_start + header.size;
            if data_end > memory.len() {
                table.anomalies.push(PropertyAnomaly::DataTruncated {
                    object,
                    property: header.number,
                    address: data_start,
                });
            }
            let data = memory[data_start.min(memory.len())..data_end.min(memory.len())].to_vec();

            table.properties.push(PropertyEntry {
                object,
                number: header.number,
                size: header.size,
                data,
                address: addr,
                encoding: header.encoding,
            });

            previous = Some(header.number);
            addr = data_end;
        }

        table
    }
}

/// An object table entry and its decoded property table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// 1-based
    pub number: u16,
    pub entry_addr: usize,
    pub property_table_addr: u16,
    pub table: PropertyTable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyAnalysis {
    pub limit: usize,
    pub objects: Vec<ObjectEntry>,
    pub violations: Vec<Violation>,
    pub anomalies: Vec<PropertyAnomaly>,
}

pub struct PropertyTableAnalyzer<'a> {
    memory: &'a [u8],
    header: &'a Header,
}

impl<'a> PropertyTableAnalyzer<'a> {
    pub fn new(memory: &'a [u8], header: &'a Header) -> Self {
        PropertyTableAnalyzer { memory, header }
    }

    /// Address of the first object entry, after the property defaults
    pub fn first_entry_addr(&self) -> usize {
        self.header.object_table_addr as usize + PROPERTY_DEFAULTS_LEN
    }

    /// Only the violations, in walk order
    pub fn analyze_all(&self) -> Vec<Violation> {
        self.analyze().violations
    }

    /// Walk every object until a zero property pointer, the end of the
    /// buffer, or `MAX_OBJECTS` objects
    pub fn analyze(&self) -> PropertyAnalysis {
        let limit = compliance_limit(self.header.version);
        let mut analysis = PropertyAnalysis {
            limit,
            ..Default::default()
        };

        let mut entry_addr = self.first_entry_addr();
        let mut number: u16 = 1;

        loop {
            if entry_addr + OBJECT_ENTRY_SIZE > self.memory.len() {
                analysis
                    .anomalies
                    .push(PropertyAnomaly::ObjectEntryTruncated { object: number, entry_addr });
                break;
            }

            let property_table_addr = get_word(self.memory, entry_addr + 7);
            if property_table_addr == 0 {
                debug!("Object table ends at entry {:#06x}", entry_addr);
                break;
            }

            if analysis.objects.len() >= MAX_OBJECTS {
                debug!("Reached safety limit of {} objects", MAX_OBJECTS);
                analysis.anomalies.push(PropertyAnomaly::ObjectCapReached);
                break;
            }

            debug!(
                "Object #{} - Property table at {:#06x}",
                number, property_table_addr
            );
            let table = PropertyTable::walk(
                self.memory,
                number,
                property_table_addr as usize,
                limit,
            );
            analysis.violations.extend_from_slice(&table.violations);
            analysis.anomalies.extend(table.anomalies.iter().cloned());
            analysis.objects.push(ObjectEntry {
                number,
                entry_addr,
                property_table_addr,
                table,
            });

            number += 1;
            entry_addr += OBJECT_ENTRY_SIZE;
        }

        analysis
    }
}

/// Decode a single property table at an arbitrary address, using the limits
/// of the file's version
pub fn analyze_table_at(memory: &[u8], header: &Header, table_addr: usize) -> PropertyTable {
    PropertyTable::walk(memory, 0, table_addr, compliance_limit(header.version))
}
