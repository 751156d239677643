//! Opcodes of the stack machine and their operand framing

use std::fmt;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// How an opcode's operand is laid out in the instruction stream.
///
/// Exactly one of `prefix` and `size` is nonzero for opcodes that carry an
/// operand; both are zero for opcodes without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandSize {
    /// Width in bytes of the little-endian length prefix (0, 1, 2 or 4)
    pub prefix: u8,
    /// Fixed operand width in bytes when there is no prefix
    pub size: u8,
}

impl OperandSize {
    /// No operand at all
    pub const NONE: Self = Self { prefix: 0, size: 0 };

    /// Operand of a fixed width
    pub const fn fixed(size: u8) -> Self {
        Self { prefix: 0, size }
    }

    /// Operand preceded by a length prefix of the given width
    pub const fn prefixed(prefix: u8) -> Self {
        Self { prefix, size: 0 }
    }

    /// Whether the operand length is read from the stream
    #[inline]
    pub const fn is_prefixed(self) -> bool {
        self.prefix > 0
    }
}

/// Width class of the jump addresses embedded in an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    /// One signed 1-byte displacement
    Short,
    /// One signed 4-byte displacement
    Long,
    /// Two signed 1-byte displacements (exception scope)
    ShortDual,
    /// Two signed 4-byte displacements (exception scope)
    LongDual,
}

impl AddressClass {
    /// Width of a single address in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Short | Self::ShortDual => 1,
            Self::Long | Self::LongDual => 4,
        }
    }

    /// Number of addresses in the operand
    #[inline]
    pub const fn count(self) -> usize {
        match self {
            Self::Short | Self::Long => 1,
            Self::ShortDual | Self::LongDual => 2,
        }
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $byte:literal, $name:literal, $framing:expr;)*) => {
        /// Stack machine opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$doc])* $variant = $byte,)*
        }

        impl Opcode {
            /// Every defined opcode, in byte order
            pub const ALL: &'static [Opcode] = &[$(Self::$variant,)*];

            /// Convert from raw byte
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Mnemonic as it appears in disassembly
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            const fn framing(self) -> OperandSize {
                match self {
                    $(Self::$variant => $framing,)*
                }
            }
        }
    };
}

use OperandSize as O;

opcodes! {
    // ==================== Constants ====================
    /// Push a 1-byte signed integer
    PushInt8 = 0x00, "PUSHINT8", O::fixed(1);
    /// Push a 2-byte signed integer
    PushInt16 = 0x01, "PUSHINT16", O::fixed(2);
    /// Push a 4-byte signed integer
    PushInt32 = 0x02, "PUSHINT32", O::fixed(4);
    /// Push an 8-byte signed integer
    PushInt64 = 0x03, "PUSHINT64", O::fixed(8);
    /// Push a 16-byte signed integer
    PushInt128 = 0x04, "PUSHINT128", O::fixed(16);
    /// Push a 32-byte signed integer
    PushInt256 = 0x05, "PUSHINT256", O::fixed(32);
    /// Push true
    PushT = 0x08, "PUSHT", O::NONE;
    /// Push false
    PushF = 0x09, "PUSHF", O::NONE;
    /// Push a pointer to a script position (relative, 4 bytes)
    PushA = 0x0A, "PUSHA", O::fixed(4);
    /// Push null
    PushNull = 0x0B, "PUSHNULL", O::NONE;
    /// Push up to 255 bytes of data
    PushData1 = 0x0C, "PUSHDATA1", O::prefixed(1);
    /// Push up to 65535 bytes of data
    PushData2 = 0x0D, "PUSHDATA2", O::prefixed(2);
    /// Push up to 4 GiB of data
    PushData4 = 0x0E, "PUSHDATA4", O::prefixed(4);
    /// Push -1
    PushM1 = 0x0F, "PUSHM1", O::NONE;
    /// Push 0
    Push0 = 0x10, "PUSH0", O::NONE;
    /// Push 1
    Push1 = 0x11, "PUSH1", O::NONE;
    /// Push 2
    Push2 = 0x12, "PUSH2", O::NONE;
    /// Push 3
    Push3 = 0x13, "PUSH3", O::NONE;
    /// Push 4
    Push4 = 0x14, "PUSH4", O::NONE;
    /// Push 5
    Push5 = 0x15, "PUSH5", O::NONE;
    /// Push 6
    Push6 = 0x16, "PUSH6", O::NONE;
    /// Push 7
    Push7 = 0x17, "PUSH7", O::NONE;
    /// Push 8
    Push8 = 0x18, "PUSH8", O::NONE;
    /// Push 9
    Push9 = 0x19, "PUSH9", O::NONE;
    /// Push 10
    Push10 = 0x1A, "PUSH10", O::NONE;
    /// Push 11
    Push11 = 0x1B, "PUSH11", O::NONE;
    /// Push 12
    Push12 = 0x1C, "PUSH12", O::NONE;
    /// Push 13
    Push13 = 0x1D, "PUSH13", O::NONE;
    /// Push 14
    Push14 = 0x1E, "PUSH14", O::NONE;
    /// Push 15
    Push15 = 0x1F, "PUSH15", O::NONE;
    /// Push 16
    Push16 = 0x20, "PUSH16", O::NONE;

    // ==================== Flow control ====================
    /// No operation
    Nop = 0x21, "NOP", O::NONE;
    /// Unconditional jump (1-byte displacement)
    Jmp = 0x22, "JMP", O::fixed(1);
    /// Unconditional jump (4-byte displacement)
    JmpL = 0x23, "JMP_L", O::fixed(4);
    /// Jump if true
    JmpIf = 0x24, "JMPIF", O::fixed(1);
    /// Jump if true (long)
    JmpIfL = 0x25, "JMPIF_L", O::fixed(4);
    /// Jump if false
    JmpIfNot = 0x26, "JMPIFNOT", O::fixed(1);
    /// Jump if false (long)
    JmpIfNotL = 0x27, "JMPIFNOT_L", O::fixed(4);
    /// Jump if equal
    JmpEq = 0x28, "JMPEQ", O::fixed(1);
    /// Jump if equal (long)
    JmpEqL = 0x29, "JMPEQ_L", O::fixed(4);
    /// Jump if not equal
    JmpNe = 0x2A, "JMPNE", O::fixed(1);
    /// Jump if not equal (long)
    JmpNeL = 0x2B, "JMPNE_L", O::fixed(4);
    /// Jump if greater
    JmpGt = 0x2C, "JMPGT", O::fixed(1);
    /// Jump if greater (long)
    JmpGtL = 0x2D, "JMPGT_L", O::fixed(4);
    /// Jump if greater or equal
    JmpGe = 0x2E, "JMPGE", O::fixed(1);
    /// Jump if greater or equal (long)
    JmpGeL = 0x2F, "JMPGE_L", O::fixed(4);
    /// Jump if less
    JmpLt = 0x30, "JMPLT", O::fixed(1);
    /// Jump if less (long)
    JmpLtL = 0x31, "JMPLT_L", O::fixed(4);
    /// Jump if less or equal
    JmpLe = 0x32, "JMPLE", O::fixed(1);
    /// Jump if less or equal (long)
    JmpLeL = 0x33, "JMPLE_L", O::fixed(4);
    /// Call a script position (1-byte displacement)
    Call = 0x34, "CALL", O::fixed(1);
    /// Call a script position (4-byte displacement)
    CallL = 0x35, "CALL_L", O::fixed(4);
    /// Call the pointer on top of the stack
    CallA = 0x36, "CALLA", O::NONE;
    /// Call a method token by index
    CallT = 0x37, "CALLT", O::fixed(2);
    /// Abort execution unconditionally
    Abort = 0x38, "ABORT", O::NONE;
    /// Abort unless top of stack is true
    Assert = 0x39, "ASSERT", O::NONE;
    /// Throw the top of stack
    Throw = 0x3A, "THROW", O::NONE;
    /// Enter a try scope (catch, finally; 1-byte each)
    Try = 0x3B, "TRY", O::fixed(2);
    /// Enter a try scope (catch, finally; 4-byte each)
    TryL = 0x3C, "TRY_L", O::fixed(8);
    /// Leave a try scope
    EndTry = 0x3D, "ENDTRY", O::fixed(1);
    /// Leave a try scope (long)
    EndTryL = 0x3E, "ENDTRY_L", O::fixed(4);
    /// End of a finally block
    EndFinally = 0x3F, "ENDFINALLY", O::NONE;
    /// Return from the current method
    Ret = 0x40, "RET", O::NONE;
    /// Invoke an interop service
    Syscall = 0x41, "SYSCALL", O::fixed(4);

    // ==================== Stack ====================
    /// Push stack depth
    Depth = 0x43, "DEPTH", O::NONE;
    /// Drop top item
    Drop = 0x45, "DROP", O::NONE;
    /// Remove second item
    Nip = 0x46, "NIP", O::NONE;
    /// Remove the n-th item
    XDrop = 0x48, "XDROP", O::NONE;
    /// Clear the stack
    Clear = 0x49, "CLEAR", O::NONE;
    /// Duplicate top item
    Dup = 0x4A, "DUP", O::NONE;
    /// Copy second item to top
    Over = 0x4B, "OVER", O::NONE;
    /// Copy the n-th item to top
    Pick = 0x4D, "PICK", O::NONE;
    /// Copy top item below second
    Tuck = 0x4E, "TUCK", O::NONE;
    /// Swap top two items
    Swap = 0x50, "SWAP", O::NONE;
    /// Rotate top three items
    Rot = 0x51, "ROT", O::NONE;
    /// Move the n-th item to top
    Roll = 0x52, "ROLL", O::NONE;
    /// Reverse top three items
    Reverse3 = 0x53, "REVERSE3", O::NONE;
    /// Reverse top four items
    Reverse4 = 0x54, "REVERSE4", O::NONE;
    /// Reverse top n items
    ReverseN = 0x55, "REVERSEN", O::NONE;

    // ==================== Slots ====================
    /// Initialize the static field slot
    InitSSlot = 0x56, "INITSSLOT", O::fixed(1);
    /// Initialize local and argument slots
    InitSlot = 0x57, "INITSLOT", O::fixed(2);
    /// Load static field 0
    LdSFld0 = 0x58, "LDSFLD0", O::NONE;
    /// Load static field 1
    LdSFld1 = 0x59, "LDSFLD1", O::NONE;
    /// Load static field 2
    LdSFld2 = 0x5A, "LDSFLD2", O::NONE;
    /// Load static field 3
    LdSFld3 = 0x5B, "LDSFLD3", O::NONE;
    /// Load static field 4
    LdSFld4 = 0x5C, "LDSFLD4", O::NONE;
    /// Load static field 5
    LdSFld5 = 0x5D, "LDSFLD5", O::NONE;
    /// Load static field 6
    LdSFld6 = 0x5E, "LDSFLD6", O::NONE;
    /// Load static field by index
    LdSFld = 0x5F, "LDSFLD", O::fixed(1);
    /// Store static field 0
    StSFld0 = 0x60, "STSFLD0", O::NONE;
    /// Store static field 1
    StSFld1 = 0x61, "STSFLD1", O::NONE;
    /// Store static field 2
    StSFld2 = 0x62, "STSFLD2", O::NONE;
    /// Store static field 3
    StSFld3 = 0x63, "STSFLD3", O::NONE;
    /// Store static field 4
    StSFld4 = 0x64, "STSFLD4", O::NONE;
    /// Store static field 5
    StSFld5 = 0x65, "STSFLD5", O::NONE;
    /// Store static field 6
    StSFld6 = 0x66, "STSFLD6", O::NONE;
    /// Store static field by index
    StSFld = 0x67, "STSFLD", O::fixed(1);
    /// Load local 0
    LdLoc0 = 0x68, "LDLOC0", O::NONE;
    /// Load local 1
    LdLoc1 = 0x69, "LDLOC1", O::NONE;
    /// Load local 2
    LdLoc2 = 0x6A, "LDLOC2", O::NONE;
    /// Load local 3
    LdLoc3 = 0x6B, "LDLOC3", O::NONE;
    /// Load local 4
    LdLoc4 = 0x6C, "LDLOC4", O::NONE;
    /// Load local 5
    LdLoc5 = 0x6D, "LDLOC5", O::NONE;
    /// Load local 6
    LdLoc6 = 0x6E, "LDLOC6", O::NONE;
    /// Load local by index
    LdLoc = 0x6F, "LDLOC", O::fixed(1);
    /// Store local 0
    StLoc0 = 0x70, "STLOC0", O::NONE;
    /// Store local 1
    StLoc1 = 0x71, "STLOC1", O::NONE;
    /// Store local 2
    StLoc2 = 0x72, "STLOC2", O::NONE;
    /// Store local 3
    StLoc3 = 0x73, "STLOC3", O::NONE;
    /// Store local 4
    StLoc4 = 0x74, "STLOC4", O::NONE;
    /// Store local 5
    StLoc5 = 0x75, "STLOC5", O::NONE;
    /// Store local 6
    StLoc6 = 0x76, "STLOC6", O::NONE;
    /// Store local by index
    StLoc = 0x77, "STLOC", O::fixed(1);
    /// Load argument 0
    LdArg0 = 0x78, "LDARG0", O::NONE;
    /// Load argument 1
    LdArg1 = 0x79, "LDARG1", O::NONE;
    /// Load argument 2
    LdArg2 = 0x7A, "LDARG2", O::NONE;
    /// Load argument 3
    LdArg3 = 0x7B, "LDARG3", O::NONE;
    /// Load argument 4
    LdArg4 = 0x7C, "LDARG4", O::NONE;
    /// Load argument 5
    LdArg5 = 0x7D, "LDARG5", O::NONE;
    /// Load argument 6
    LdArg6 = 0x7E, "LDARG6", O::NONE;
    /// Load argument by index
    LdArg = 0x7F, "LDARG", O::fixed(1);
    /// Store argument 0
    StArg0 = 0x80, "STARG0", O::NONE;
    /// Store argument 1
    StArg1 = 0x81, "STARG1", O::NONE;
    /// Store argument 2
    StArg2 = 0x82, "STARG2", O::NONE;
    /// Store argument 3
    StArg3 = 0x83, "STARG3", O::NONE;
    /// Store argument 4
    StArg4 = 0x84, "STARG4", O::NONE;
    /// Store argument 5
    StArg5 = 0x85, "STARG5", O::NONE;
    /// Store argument 6
    StArg6 = 0x86, "STARG6", O::NONE;
    /// Store argument by index
    StArg = 0x87, "STARG", O::fixed(1);

    // ==================== Splice ====================
    /// Create a buffer
    NewBuffer = 0x88, "NEWBUFFER", O::NONE;
    /// Copy bytes between buffers
    MemCpy = 0x89, "MEMCPY", O::NONE;
    /// Concatenate two byte strings
    Cat = 0x8B, "CAT", O::NONE;
    /// Substring
    SubStr = 0x8C, "SUBSTR", O::NONE;
    /// Leftmost bytes
    Left = 0x8D, "LEFT", O::NONE;
    /// Rightmost bytes
    Right = 0x8E, "RIGHT", O::NONE;

    // ==================== Bitwise ====================
    /// Bitwise inversion
    Invert = 0x90, "INVERT", O::NONE;
    /// Bitwise and
    And = 0x91, "AND", O::NONE;
    /// Bitwise or
    Or = 0x92, "OR", O::NONE;
    /// Bitwise xor
    Xor = 0x93, "XOR", O::NONE;
    /// Equality
    Equal = 0x97, "EQUAL", O::NONE;
    /// Inequality
    NotEqual = 0x98, "NOTEQUAL", O::NONE;

    // ==================== Arithmetic ====================
    /// Sign of an integer
    Sign = 0x99, "SIGN", O::NONE;
    /// Absolute value
    Abs = 0x9A, "ABS", O::NONE;
    /// Negation
    Negate = 0x9B, "NEGATE", O::NONE;
    /// Increment
    Inc = 0x9C, "INC", O::NONE;
    /// Decrement
    Dec = 0x9D, "DEC", O::NONE;
    /// Addition
    Add = 0x9E, "ADD", O::NONE;
    /// Subtraction
    Sub = 0x9F, "SUB", O::NONE;
    /// Multiplication
    Mul = 0xA0, "MUL", O::NONE;
    /// Division
    Div = 0xA1, "DIV", O::NONE;
    /// Remainder
    Mod = 0xA2, "MOD", O::NONE;
    /// Exponentiation
    Pow = 0xA3, "POW", O::NONE;
    /// Integer square root
    Sqrt = 0xA4, "SQRT", O::NONE;
    /// Modular multiplication
    ModMul = 0xA5, "MODMUL", O::NONE;
    /// Modular exponentiation
    ModPow = 0xA6, "MODPOW", O::NONE;
    /// Shift left
    Shl = 0xA8, "SHL", O::NONE;
    /// Shift right
    Shr = 0xA9, "SHR", O::NONE;
    /// Boolean not
    Not = 0xAA, "NOT", O::NONE;
    /// Boolean and
    BoolAnd = 0xAB, "BOOLAND", O::NONE;
    /// Boolean or
    BoolOr = 0xAC, "BOOLOR", O::NONE;
    /// Not zero
    Nz = 0xB1, "NZ", O::NONE;
    /// Numeric equality
    NumEqual = 0xB3, "NUMEQUAL", O::NONE;
    /// Numeric inequality
    NumNotEqual = 0xB4, "NUMNOTEQUAL", O::NONE;
    /// Less than
    Lt = 0xB5, "LT", O::NONE;
    /// Less than or equal
    Le = 0xB6, "LE", O::NONE;
    /// Greater than
    Gt = 0xB7, "GT", O::NONE;
    /// Greater than or equal
    Ge = 0xB8, "GE", O::NONE;
    /// Minimum
    Min = 0xB9, "MIN", O::NONE;
    /// Maximum
    Max = 0xBA, "MAX", O::NONE;
    /// Range check
    Within = 0xBB, "WITHIN", O::NONE;

    // ==================== Compound types ====================
    /// Pack a map
    PackMap = 0xBE, "PACKMAP", O::NONE;
    /// Pack a struct
    PackStruct = 0xBF, "PACKSTRUCT", O::NONE;
    /// Pack an array
    Pack = 0xC0, "PACK", O::NONE;
    /// Unpack a compound value
    Unpack = 0xC1, "UNPACK", O::NONE;
    /// Push an empty array
    NewArray0 = 0xC2, "NEWARRAY0", O::NONE;
    /// Push an array of n nulls
    NewArray = 0xC3, "NEWARRAY", O::NONE;
    /// Push an array of n default values of a type
    NewArrayT = 0xC4, "NEWARRAY_T", O::fixed(1);
    /// Push an empty struct
    NewStruct0 = 0xC5, "NEWSTRUCT0", O::NONE;
    /// Push a struct of n nulls
    NewStruct = 0xC6, "NEWSTRUCT", O::NONE;
    /// Push an empty map
    NewMap = 0xC8, "NEWMAP", O::NONE;
    /// Size of a value
    Size = 0xCA, "SIZE", O::NONE;
    /// Key membership test
    HasKey = 0xCB, "HASKEY", O::NONE;
    /// Keys of a map
    Keys = 0xCC, "KEYS", O::NONE;
    /// Values of a compound value
    Values = 0xCD, "VALUES", O::NONE;
    /// Item lookup
    PickItem = 0xCE, "PICKITEM", O::NONE;
    /// Append to an array
    Append = 0xCF, "APPEND", O::NONE;
    /// Set an item
    SetItem = 0xD0, "SETITEM", O::NONE;
    /// Reverse an array in place
    ReverseItems = 0xD1, "REVERSEITEMS", O::NONE;
    /// Remove an item
    Remove = 0xD2, "REMOVE", O::NONE;
    /// Remove all items
    ClearItems = 0xD3, "CLEARITEMS", O::NONE;
    /// Pop the last item
    PopItem = 0xD4, "POPITEM", O::NONE;

    // ==================== Types ====================
    /// Null test
    IsNull = 0xD8, "ISNULL", O::NONE;
    /// Type test
    IsType = 0xD9, "ISTYPE", O::fixed(1);
    /// Type conversion
    Convert = 0xDB, "CONVERT", O::fixed(1);

    // ==================== Extensions ====================
    /// Abort with the message on top of stack
    AbortMsg = 0xE0, "ABORTMSG", O::NONE;
    /// Abort with a message unless the condition is true
    AssertMsg = 0xE1, "ASSERTMSG", O::NONE;
}

const fn build_framing_table() -> [OperandSize; 256] {
    let mut table = [OperandSize::NONE; 256];
    let mut byte = 0;
    while byte < 256 {
        if let Some(op) = Opcode::from_byte(byte as u8) {
            table[byte] = op.framing();
        }
        byte += 1;
    }
    table
}

static FRAMING: [OperandSize; 256] = build_framing_table();

static BY_NAME: LazyLock<FxHashMap<&'static str, Opcode>> =
    LazyLock::new(|| Opcode::ALL.iter().map(|op| (op.name(), *op)).collect());

impl Opcode {
    /// Convert to raw byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Look up an opcode by mnemonic (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        BY_NAME.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Operand framing of this opcode
    #[inline]
    pub fn operand_size(self) -> OperandSize {
        FRAMING[self as usize]
    }

    /// Address class, for opcodes whose operand embeds jump addresses
    pub const fn address_class(self) -> Option<AddressClass> {
        match self {
            Self::Jmp
            | Self::JmpIf
            | Self::JmpIfNot
            | Self::JmpEq
            | Self::JmpNe
            | Self::JmpGt
            | Self::JmpGe
            | Self::JmpLt
            | Self::JmpLe
            | Self::Call
            | Self::EndTry => Some(AddressClass::Short),
            Self::JmpL
            | Self::JmpIfL
            | Self::JmpIfNotL
            | Self::JmpEqL
            | Self::JmpNeL
            | Self::JmpGtL
            | Self::JmpGeL
            | Self::JmpLtL
            | Self::JmpLeL
            | Self::CallL
            | Self::EndTryL
            | Self::PushA => Some(AddressClass::Long),
            Self::Try => Some(AddressClass::ShortDual),
            Self::TryL => Some(AddressClass::LongDual),
            _ => None,
        }
    }

    /// Whether control never falls through to the next instruction
    pub const fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::JmpL | Self::Ret | Self::Throw | Self::Abort | Self::AbortMsg
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.to_byte()), Some(op));
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_byte(0xFF), None);
        assert_eq!(Opcode::from_byte(0x42), None);
        assert_eq!(Opcode::from_name("JUMP"), None);
    }

    #[test]
    fn test_framing_exclusive() {
        for &op in Opcode::ALL {
            let framing = op.operand_size();
            assert!(framing.prefix == 0 || framing.size == 0, "{op}");
        }
    }

    #[test]
    fn test_framing_values() {
        assert_eq!(Opcode::PushInt8.operand_size(), OperandSize::fixed(1));
        assert_eq!(Opcode::PushData2.operand_size(), OperandSize::prefixed(2));
        assert_eq!(Opcode::TryL.operand_size(), OperandSize::fixed(8));
        assert_eq!(Opcode::Ret.operand_size(), OperandSize::NONE);
    }

    #[test]
    fn test_address_operands_fit_framing() {
        for &op in Opcode::ALL {
            if let Some(class) = op.address_class() {
                assert_eq!(
                    class.width() * class.count(),
                    op.operand_size().size as usize,
                    "{op}"
                );
            }
        }
    }

    #[test]
    fn test_boolean_and_message_opcodes() {
        for (byte, op) in [
            (0x08, Opcode::PushT),
            (0x09, Opcode::PushF),
            (0xA5, Opcode::ModMul),
            (0xA6, Opcode::ModPow),
            (0xE0, Opcode::AbortMsg),
            (0xE1, Opcode::AssertMsg),
        ] {
            assert_eq!(Opcode::from_byte(byte), Some(op));
            assert_eq!(op.operand_size(), OperandSize::NONE);
            assert_eq!(op.address_class(), None);
        }
        assert!(Opcode::AbortMsg.is_terminator());
        assert!(!Opcode::AssertMsg.is_terminator());
    }

    #[test]
    fn test_mnemonic_case_insensitive() {
        assert_eq!(Opcode::from_name("jmp_l"), Some(Opcode::JmpL));
        assert_eq!(Opcode::JmpIfNotL.to_string(), "JMPIFNOT_L");
    }
}
