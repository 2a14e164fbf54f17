use crate::instruction::OperandCount;

/// Static facts about one opcode: its mnemonic and which trailing fields
/// follow the operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSpec {
    pub name: &'static str,
    /// A store-variable byte follows the operands
    pub store: bool,
    /// A branch offset (one or two bytes) follows the store byte, if any
    pub branch: bool,
    /// An inline packed string follows
    pub text: bool,
}

const fn plain(name: &'static str) -> Option<OpcodeSpec> {
    Some(OpcodeSpec {
        name,
        store: false,
        branch: false,
        text: false,
    })
}

const fn store(name: &'static str) -> Option<OpcodeSpec> {
    Some(OpcodeSpec {
        name,
        store: true,
        branch: false,
        text: false,
    })
}

const fn branch(name: &'static str) -> Option<OpcodeSpec> {
    Some(OpcodeSpec {
        name,
        store: false,
        branch: true,
        text: false,
    })
}

const fn store_branch(name: &'static str) -> Option<OpcodeSpec> {
    Some(OpcodeSpec {
        name,
        store: true,
        branch: true,
        text: false,
    })
}

const fn text(name: &'static str) -> Option<OpcodeSpec> {
    Some(OpcodeSpec {
        name,
        store: false,
        branch: false,
        text: true,
    })
}

/// 2OP opcodes (long form, and variable form with bit 5 clear)
pub static TWO_OP: [Option<OpcodeSpec>; 32] = [
    None,                    // 0x00
    branch("je"),            // 0x01
    branch("jl"),            // 0x02
    branch("jg"),            // 0x03
    branch("dec_chk"),       // 0x04
    branch("inc_chk"),       // 0x05
    branch("jin"),           // 0x06
    branch("test"),          // 0x07
    store("or"),             // 0x08
    store("and"),            // 0x09
    branch("test_attr"),     // 0x0A
    plain("set_attr"),       // 0x0B
    plain("clear_attr"),     // 0x0C
    plain("store"),          // 0x0D
    plain("insert_obj"),     // 0x0E
    store("loadw"),          // 0x0F
    store("loadb"),          // 0x10
    store("get_prop"),       // 0x11
    store("get_prop_addr"),  // 0x12
    store("get_next_prop"),  // 0x13
    store("add"),            // 0x14
    store("sub"),            // 0x15
    store("mul"),            // 0x16
    store("div"),            // 0x17
    store("mod"),            // 0x18
    store("call_2s"),        // 0x19 V4+
    plain("call_2n"),        // 0x1A V5+
    plain("set_colour"),     // 0x1B V5+
    plain("throw"),          // 0x1C V5+
    None,                    // 0x1D
    None,                    // 0x1E
    None,                    // 0x1F
];

/// 1OP opcodes (short form with an operand)
pub static ONE_OP: [Option<OpcodeSpec>; 16] = [
    branch("jz"),                // 0x00
    store_branch("get_sibling"), // 0x01
    store_branch("get_child"),   // 0x02
    store("get_parent"),         // 0x03
    store("get_prop_len"),       // 0x04
    plain("inc"),                // 0x05
    plain("dec"),                // 0x06
    plain("print_addr"),         // 0x07
    store("call_1s"),            // 0x08 V4+
    plain("remove_obj"),         // 0x09
    plain("print_obj"),          // 0x0A
    plain("ret"),                // 0x0B
    plain("jump"),               // 0x0C
    plain("print_paddr"),        // 0x0D
    store("load"),               // 0x0E
    store("not"),                // 0x0F V1-4, call_1n in V5+
];

/// 0OP opcodes (short form, operand type 0b11)
pub static ZERO_OP: [Option<OpcodeSpec>; 16] = [
    plain("rtrue"),       // 0x00
    plain("rfalse"),      // 0x01
    text("print"),        // 0x02
    text("print_ret"),    // 0x03
    plain("nop"),         // 0x04
    branch("save"),       // 0x05 V1-3
    branch("restore"),    // 0x06 V1-3
    plain("restart"),     // 0x07
    plain("ret_popped"),  // 0x08
    plain("pop"),         // 0x09 V1-4, catch in V5+
    plain("quit"),        // 0x0A
    plain("new_line"),    // 0x0B
    plain("show_status"), // 0x0C V3 only
    branch("verify"),     // 0x0D
    plain("extended"),    // 0x0E V5+ prefix, not decoded further
    branch("piracy"),     // 0x0F
];

/// VAR opcodes (variable form with bit 5 set)
pub static VAR_OP: [Option<OpcodeSpec>; 32] = [
    store("call_vs"),             // 0x00
    plain("storew"),              // 0x01
    plain("storeb"),              // 0x02
    plain("put_prop"),            // 0x03
    plain("sread"),               // 0x04 V1-4, aread in V5+
    plain("print_char"),          // 0x05
    plain("print_num"),           // 0x06
    store("random"),              // 0x07
    plain("push"),                // 0x08
    plain("pull"),                // 0x09
    plain("split_window"),        // 0x0A V3+
    plain("set_window"),          // 0x0B V3+
    store("call_vs2"),            // 0x0C V4+
    plain("erase_window"),        // 0x0D V4+
    plain("erase_line"),          // 0x0E V4+
    plain("set_cursor"),          // 0x0F V4+
    plain("get_cursor"),          // 0x10 V4+
    plain("set_text_style"),      // 0x11 V4+
    plain("buffer_mode"),         // 0x12 V4+
    plain("output_stream"),       // 0x13 V3+
    plain("input_stream"),        // 0x14 V3+
    plain("sound_effect"),        // 0x15 V3+
    store("read_char"),           // 0x16 V4+
    store_branch("scan_table"),   // 0x17 V4+
    store("not"),                 // 0x18 V5+
    plain("call_vn"),             // 0x19 V5+
    plain("call_vn2"),            // 0x1A V5+
    plain("tokenise"),            // 0x1B V5+
    plain("encode_text"),         // 0x1C V5+
    plain("copy_table"),          // 0x1D V5+
    plain("print_table"),         // 0x1E V5+
    branch("check_arg_count"),    // 0x1F V5+
];

fn table_for(operand_count: OperandCount) -> &'static [Option<OpcodeSpec>] {
    match operand_count {
        OperandCount::Op0 => &ZERO_OP,
        OperandCount::Op1 => &ONE_OP,
        OperandCount::Op2 => &TWO_OP,
        OperandCount::Var => &VAR_OP,
    }
}

/// Look up an opcode in its operand-count table. `None` means unknown.
pub fn lookup(operand_count: OperandCount, opcode: u8) -> Option<&'static OpcodeSpec> {
    table_for(operand_count)
        .get(opcode as usize)
        .and_then(|entry| entry.as_ref())
}

/// Mnemonic for an opcode, synthesizing `unknown_<kind>_<hex>` when the
/// table has no entry
pub fn instruction_name(operand_count: OperandCount, opcode: u8) -> String {
    match lookup(operand_count, opcode) {
        Some(spec) => spec.name.to_string(),
        None => format!("unknown_{}_{:02x}", operand_count.tag(), opcode),
    }
}
