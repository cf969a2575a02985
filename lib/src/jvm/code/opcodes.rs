use std::fmt;

/// Raw JVM opcode
///
/// Only the "long" forms of local variable instructions are used in [`super::Instruction`]: the
/// decoder folds `iload_0` into `ILOAD` with index `0` (and likewise for `wide`). Similarly,
/// `LDC_W` and `LDC2_W` only ever show up in serialized bytecode.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-6.html#jvms-6.5
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const NOP: Opcode = Opcode(0x00);
    pub const ACONST_NULL: Opcode = Opcode(0x01);
    pub const ICONST_M1: Opcode = Opcode(0x02);
    pub const ICONST_0: Opcode = Opcode(0x03);
    pub const ICONST_1: Opcode = Opcode(0x04);
    pub const ICONST_2: Opcode = Opcode(0x05);
    pub const ICONST_3: Opcode = Opcode(0x06);
    pub const ICONST_4: Opcode = Opcode(0x07);
    pub const ICONST_5: Opcode = Opcode(0x08);
    pub const LCONST_0: Opcode = Opcode(0x09);
    pub const LCONST_1: Opcode = Opcode(0x0a);
    pub const FCONST_0: Opcode = Opcode(0x0b);
    pub const FCONST_1: Opcode = Opcode(0x0c);
    pub const FCONST_2: Opcode = Opcode(0x0d);
    pub const DCONST_0: Opcode = Opcode(0x0e);
    pub const DCONST_1: Opcode = Opcode(0x0f);
    pub const BIPUSH: Opcode = Opcode(0x10);
    pub const SIPUSH: Opcode = Opcode(0x11);
    pub const LDC: Opcode = Opcode(0x12);
    pub const LDC_W: Opcode = Opcode(0x13);
    pub const LDC2_W: Opcode = Opcode(0x14);
    pub const ILOAD: Opcode = Opcode(0x15);
    pub const LLOAD: Opcode = Opcode(0x16);
    pub const FLOAD: Opcode = Opcode(0x17);
    pub const DLOAD: Opcode = Opcode(0x18);
    pub const ALOAD: Opcode = Opcode(0x19);
    pub const ILOAD_0: Opcode = Opcode(0x1a);
    pub const ILOAD_1: Opcode = Opcode(0x1b);
    pub const ILOAD_2: Opcode = Opcode(0x1c);
    pub const ILOAD_3: Opcode = Opcode(0x1d);
    pub const LLOAD_0: Opcode = Opcode(0x1e);
    pub const LLOAD_1: Opcode = Opcode(0x1f);
    pub const LLOAD_2: Opcode = Opcode(0x20);
    pub const LLOAD_3: Opcode = Opcode(0x21);
    pub const FLOAD_0: Opcode = Opcode(0x22);
    pub const FLOAD_1: Opcode = Opcode(0x23);
    pub const FLOAD_2: Opcode = Opcode(0x24);
    pub const FLOAD_3: Opcode = Opcode(0x25);
    pub const DLOAD_0: Opcode = Opcode(0x26);
    pub const DLOAD_1: Opcode = Opcode(0x27);
    pub const DLOAD_2: Opcode = Opcode(0x28);
    pub const DLOAD_3: Opcode = Opcode(0x29);
    pub const ALOAD_0: Opcode = Opcode(0x2a);
    pub const ALOAD_1: Opcode = Opcode(0x2b);
    pub const ALOAD_2: Opcode = Opcode(0x2c);
    pub const ALOAD_3: Opcode = Opcode(0x2d);
    pub const IALOAD: Opcode = Opcode(0x2e);
    pub const LALOAD: Opcode = Opcode(0x2f);
    pub const FALOAD: Opcode = Opcode(0x30);
    pub const DALOAD: Opcode = Opcode(0x31);
    pub const AALOAD: Opcode = Opcode(0x32);
    pub const BALOAD: Opcode = Opcode(0x33);
    pub const CALOAD: Opcode = Opcode(0x34);
    pub const SALOAD: Opcode = Opcode(0x35);
    pub const ISTORE: Opcode = Opcode(0x36);
    pub const LSTORE: Opcode = Opcode(0x37);
    pub const FSTORE: Opcode = Opcode(0x38);
    pub const DSTORE: Opcode = Opcode(0x39);
    pub const ASTORE: Opcode = Opcode(0x3a);
    pub const ISTORE_0: Opcode = Opcode(0x3b);
    pub const ISTORE_1: Opcode = Opcode(0x3c);
    pub const ISTORE_2: Opcode = Opcode(0x3d);
    pub const ISTORE_3: Opcode = Opcode(0x3e);
    pub const LSTORE_0: Opcode = Opcode(0x3f);
    pub const LSTORE_1: Opcode = Opcode(0x40);
    pub const LSTORE_2: Opcode = Opcode(0x41);
    pub const LSTORE_3: Opcode = Opcode(0x42);
    pub const FSTORE_0: Opcode = Opcode(0x43);
    pub const FSTORE_1: Opcode = Opcode(0x44);
    pub const FSTORE_2: Opcode = Opcode(0x45);
    pub const FSTORE_3: Opcode = Opcode(0x46);
    pub const DSTORE_0: Opcode = Opcode(0x47);
    pub const DSTORE_1: Opcode = Opcode(0x48);
    pub const DSTORE_2: Opcode = Opcode(0x49);
    pub const DSTORE_3: Opcode = Opcode(0x4a);
    pub const ASTORE_0: Opcode = Opcode(0x4b);
    pub const ASTORE_1: Opcode = Opcode(0x4c);
    pub const ASTORE_2: Opcode = Opcode(0x4d);
    pub const ASTORE_3: Opcode = Opcode(0x4e);
    pub const IASTORE: Opcode = Opcode(0x4f);
    pub const LASTORE: Opcode = Opcode(0x50);
    pub const FASTORE: Opcode = Opcode(0x51);
    pub const DASTORE: Opcode = Opcode(0x52);
    pub const AASTORE: Opcode = Opcode(0x53);
    pub const BASTORE: Opcode = Opcode(0x54);
    pub const CASTORE: Opcode = Opcode(0x55);
    pub const SASTORE: Opcode = Opcode(0x56);
    pub const POP: Opcode = Opcode(0x57);
    pub const POP2: Opcode = Opcode(0x58);
    pub const DUP: Opcode = Opcode(0x59);
    pub const DUP_X1: Opcode = Opcode(0x5a);
    pub const DUP_X2: Opcode = Opcode(0x5b);
    pub const DUP2: Opcode = Opcode(0x5c);
    pub const DUP2_X1: Opcode = Opcode(0x5d);
    pub const DUP2_X2: Opcode = Opcode(0x5e);
    pub const SWAP: Opcode = Opcode(0x5f);
    pub const IADD: Opcode = Opcode(0x60);
    pub const LADD: Opcode = Opcode(0x61);
    pub const FADD: Opcode = Opcode(0x62);
    pub const DADD: Opcode = Opcode(0x63);
    pub const ISUB: Opcode = Opcode(0x64);
    pub const LSUB: Opcode = Opcode(0x65);
    pub const FSUB: Opcode = Opcode(0x66);
    pub const DSUB: Opcode = Opcode(0x67);
    pub const IMUL: Opcode = Opcode(0x68);
    pub const LMUL: Opcode = Opcode(0x69);
    pub const FMUL: Opcode = Opcode(0x6a);
    pub const DMUL: Opcode = Opcode(0x6b);
    pub const IDIV: Opcode = Opcode(0x6c);
    pub const LDIV: Opcode = Opcode(0x6d);
    pub const FDIV: Opcode = Opcode(0x6e);
    pub const DDIV: Opcode = Opcode(0x6f);
    pub const IREM: Opcode = Opcode(0x70);
    pub const LREM: Opcode = Opcode(0x71);
    pub const FREM: Opcode = Opcode(0x72);
    pub const DREM: Opcode = Opcode(0x73);
    pub const INEG: Opcode = Opcode(0x74);
    pub const LNEG: Opcode = Opcode(0x75);
    pub const FNEG: Opcode = Opcode(0x76);
    pub const DNEG: Opcode = Opcode(0x77);
    pub const ISHL: Opcode = Opcode(0x78);
    pub const LSHL: Opcode = Opcode(0x79);
    pub const ISHR: Opcode = Opcode(0x7a);
    pub const LSHR: Opcode = Opcode(0x7b);
    pub const IUSHR: Opcode = Opcode(0x7c);
    pub const LUSHR: Opcode = Opcode(0x7d);
    pub const IAND: Opcode = Opcode(0x7e);
    pub const LAND: Opcode = Opcode(0x7f);
    pub const IOR: Opcode = Opcode(0x80);
    pub const LOR: Opcode = Opcode(0x81);
    pub const IXOR: Opcode = Opcode(0x82);
    pub const LXOR: Opcode = Opcode(0x83);
    pub const IINC: Opcode = Opcode(0x84);
    pub const I2L: Opcode = Opcode(0x85);
    pub const I2F: Opcode = Opcode(0x86);
    pub const I2D: Opcode = Opcode(0x87);
    pub const L2I: Opcode = Opcode(0x88);
    pub const L2F: Opcode = Opcode(0x89);
    pub const L2D: Opcode = Opcode(0x8a);
    pub const F2I: Opcode = Opcode(0x8b);
    pub const F2L: Opcode = Opcode(0x8c);
    pub const F2D: Opcode = Opcode(0x8d);
    pub const D2I: Opcode = Opcode(0x8e);
    pub const D2L: Opcode = Opcode(0x8f);
    pub const D2F: Opcode = Opcode(0x90);
    pub const I2B: Opcode = Opcode(0x91);
    pub const I2C: Opcode = Opcode(0x92);
    pub const I2S: Opcode = Opcode(0x93);
    pub const LCMP: Opcode = Opcode(0x94);
    pub const FCMPL: Opcode = Opcode(0x95);
    pub const FCMPG: Opcode = Opcode(0x96);
    pub const DCMPL: Opcode = Opcode(0x97);
    pub const DCMPG: Opcode = Opcode(0x98);
    pub const IFEQ: Opcode = Opcode(0x99);
    pub const IFNE: Opcode = Opcode(0x9a);
    pub const IFLT: Opcode = Opcode(0x9b);
    pub const IFGE: Opcode = Opcode(0x9c);
    pub const IFGT: Opcode = Opcode(0x9d);
    pub const IFLE: Opcode = Opcode(0x9e);
    pub const IF_ICMPEQ: Opcode = Opcode(0x9f);
    pub const IF_ICMPNE: Opcode = Opcode(0xa0);
    pub const IF_ICMPLT: Opcode = Opcode(0xa1);
    pub const IF_ICMPGE: Opcode = Opcode(0xa2);
    pub const IF_ICMPGT: Opcode = Opcode(0xa3);
    pub const IF_ICMPLE: Opcode = Opcode(0xa4);
    pub const IF_ACMPEQ: Opcode = Opcode(0xa5);
    pub const IF_ACMPNE: Opcode = Opcode(0xa6);
    pub const GOTO: Opcode = Opcode(0xa7);
    pub const JSR: Opcode = Opcode(0xa8);
    pub const RET: Opcode = Opcode(0xa9);
    pub const TABLESWITCH: Opcode = Opcode(0xaa);
    pub const LOOKUPSWITCH: Opcode = Opcode(0xab);
    pub const IRETURN: Opcode = Opcode(0xac);
    pub const LRETURN: Opcode = Opcode(0xad);
    pub const FRETURN: Opcode = Opcode(0xae);
    pub const DRETURN: Opcode = Opcode(0xaf);
    pub const ARETURN: Opcode = Opcode(0xb0);
    pub const RETURN: Opcode = Opcode(0xb1);
    pub const GETSTATIC: Opcode = Opcode(0xb2);
    pub const PUTSTATIC: Opcode = Opcode(0xb3);
    pub const GETFIELD: Opcode = Opcode(0xb4);
    pub const PUTFIELD: Opcode = Opcode(0xb5);
    pub const INVOKEVIRTUAL: Opcode = Opcode(0xb6);
    pub const INVOKESPECIAL: Opcode = Opcode(0xb7);
    pub const INVOKESTATIC: Opcode = Opcode(0xb8);
    pub const INVOKEINTERFACE: Opcode = Opcode(0xb9);
    pub const INVOKEDYNAMIC: Opcode = Opcode(0xba);
    pub const NEW: Opcode = Opcode(0xbb);
    pub const NEWARRAY: Opcode = Opcode(0xbc);
    pub const ANEWARRAY: Opcode = Opcode(0xbd);
    pub const ARRAYLENGTH: Opcode = Opcode(0xbe);
    pub const ATHROW: Opcode = Opcode(0xbf);
    pub const CHECKCAST: Opcode = Opcode(0xc0);
    pub const INSTANCEOF: Opcode = Opcode(0xc1);
    pub const MONITORENTER: Opcode = Opcode(0xc2);
    pub const MONITOREXIT: Opcode = Opcode(0xc3);
    pub const WIDE: Opcode = Opcode(0xc4);
    pub const MULTIANEWARRAY: Opcode = Opcode(0xc5);
    pub const IFNULL: Opcode = Opcode(0xc6);
    pub const IFNONNULL: Opcode = Opcode(0xc7);
    pub const GOTO_W: Opcode = Opcode(0xc8);
    pub const JSR_W: Opcode = Opcode(0xc9);

    /// Mnemonic used in the JVM specification (eg. `invokevirtual`)
    pub fn mnemonic(self) -> &'static str {
        MNEMONICS.get(self.0 as usize).copied().unwrap_or("<invalid>")
    }

    /// Conditional branch taken in exactly the opposite cases (eg. `ifne` for `ifeq`)
    pub fn inverted_branch(self) -> Option<Opcode> {
        match self.0 {
            0x99..=0xa6 => Some(Opcode(((self.0 - 0x99) ^ 1) + 0x99)),
            0xc6 | 0xc7 => Some(Opcode(self.0 ^ 1)),
            _ => None,
        }
    }

    /// Is this a valid opcode (as opposed to a reserved or unassigned byte)?
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < MNEMONICS.len()
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

const MNEMONICS: [&str; 202] = [
    "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4",
    "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2", "dconst_0", "dconst_1",
    "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload", "fload", "dload", "aload",
    "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1", "lload_2", "lload_3",
    "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1", "dload_2", "dload_3",
    "aload_0", "aload_1", "aload_2", "aload_3", "iaload", "laload", "faload", "daload", "aaload",
    "baload", "caload", "saload", "istore", "lstore", "fstore", "dstore", "astore", "istore_0",
    "istore_1", "istore_2", "istore_3", "lstore_0", "lstore_1", "lstore_2", "lstore_3", "fstore_0",
    "fstore_1", "fstore_2", "fstore_3", "dstore_0", "dstore_1", "dstore_2", "dstore_3", "astore_0",
    "astore_1", "astore_2", "astore_3", "iastore", "lastore", "fastore", "dastore", "aastore",
    "bastore", "castore", "sastore", "pop", "pop2", "dup", "dup_x1", "dup_x2", "dup2", "dup2_x1",
    "dup2_x2", "swap", "iadd", "ladd", "fadd", "dadd", "isub", "lsub", "fsub", "dsub", "imul",
    "lmul", "fmul", "dmul", "idiv", "ldiv", "fdiv", "ddiv", "irem", "lrem", "frem", "drem", "ineg",
    "lneg", "fneg", "dneg", "ishl", "lshl", "ishr", "lshr", "iushr", "lushr", "iand", "land",
    "ior", "lor", "ixor", "lxor", "iinc", "i2l", "i2f", "i2d", "l2i", "l2f", "l2d", "f2i", "f2l",
    "f2d", "d2i", "d2l", "d2f", "i2b", "i2c", "i2s", "lcmp", "fcmpl", "fcmpg", "dcmpl", "dcmpg",
    "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle", "if_icmpeq", "if_icmpne", "if_icmplt",
    "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq", "if_acmpne", "goto", "jsr", "ret",
    "tableswitch", "lookupswitch", "ireturn", "lreturn", "freturn", "dreturn", "areturn", "return",
    "getstatic", "putstatic", "getfield", "putfield", "invokevirtual", "invokespecial",
    "invokestatic", "invokeinterface", "invokedynamic", "new", "newarray", "anewarray",
    "arraylength", "athrow", "checkcast", "instanceof", "monitorenter", "monitorexit", "wide",
    "multianewarray", "ifnull", "ifnonnull", "goto_w", "jsr_w",
];
