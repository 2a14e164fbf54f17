// Test utilities for building synthetic story images

/// Object table address used by every built story
pub const OBJECT_TABLE: usize = 0x40;

const GLOBALS_LEN: usize = 0x20;
const STATIC_LEN: usize = 0x10;

enum ObjectSpec {
    Table(Vec<u8>),
    Pointer(u16),
}

/// Builds a minimal story file: header, property defaults, object entries
/// followed by a zero entry, property tables, globals, a little static
/// memory, then code in high memory at the initial PC.
pub struct StoryBuilder {
    version: u8,
    objects: Vec<ObjectSpec>,
    code: Vec<u8>,
}

impl StoryBuilder {
    pub fn new() -> Self {
        StoryBuilder {
            version: 3,
            objects: Vec::new(),
            code: Vec::new(),
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Add an object whose property table holds exactly these bytes
    pub fn object(mut self, property_table: Vec<u8>) -> Self {
        self.objects.push(ObjectSpec::Table(property_table));
        self
    }

    /// Add an object with a raw property table pointer
    pub fn object_pointer(mut self, pointer: u16) -> Self {
        self.objects.push(ObjectSpec::Pointer(pointer));
        self
    }

    pub fn code(mut self, code: &[u8]) -> Self {
        self.code.extend_from_slice(code);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let entries_start = OBJECT_TABLE + 62;
        // one extra all-zero entry ends the object table
        let tables_start = entries_start + (self.objects.len() + 1) * 9;

        let mut memory = vec![0u8; tables_start];
        for (i, spec) in self.objects.iter().enumerate() {
            let pointer = match spec {
                ObjectSpec::Table(bytes) => {
                    let addr = memory.len();
                    memory.extend_from_slice(bytes);
                    addr as u16
                }
                ObjectSpec::Pointer(pointer) => *pointer,
            };
            let entry = entries_start + i * 9;
            memory[entry + 7..entry + 9].copy_from_slice(&pointer.to_be_bytes());
        }

        let globals = memory.len();
        memory.resize(globals + GLOBALS_LEN, 0);
        let static_base = memory.len();
        memory.resize(static_base + STATIC_LEN, 0);
        let high_base = memory.len();
        memory.extend_from_slice(&self.code);

        memory[0] = self.version;
        put_word(&mut memory, 2, 1); // release
        put_word(&mut memory, 4, high_base as u16);
        put_word(&mut memory, 6, high_base as u16);
        put_word(&mut memory, 8, static_base as u16); // dictionary
        put_word(&mut memory, 10, OBJECT_TABLE as u16);
        put_word(&mut memory, 12, globals as u16);
        put_word(&mut memory, 14, static_base as u16);
        memory
    }
}

impl Default for StoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn put_word(memory: &mut [u8], addr: usize, value: u16) {
    memory[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
}

/// A one-byte property header followed by its data
pub fn basic_property(number: u8, data: &[u8]) -> Vec<u8> {
    assert!((1..=8).contains(&data.len()) && number < 32);
    let mut bytes = vec![((data.len() as u8 - 1) << 5) | number];
    bytes.extend_from_slice(data);
    bytes
}

/// A two-byte header property; `size_field` is written as given
pub fn extended_property(number: u8, size_field: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x80 | (number & 0x3F), size_field];
    bytes.extend_from_slice(data);
    bytes
}

/// Name length byte, packed name words, properties, and the 0 terminator
pub fn property_table(name_words: &[u16], properties: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = vec![name_words.len() as u8];
    for word in name_words {
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    for property in properties {
        bytes.extend_from_slice(property);
    }
    bytes.push(0);
    bytes
}
