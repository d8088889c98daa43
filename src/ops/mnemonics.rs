use std::fmt;

/// Every opcode the JVM defines in `0x00..=0xCA`, plus a proxy for byte
/// values outside that range.
///
/// ref: <https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#page=563>
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Nop,
    AconstNull,
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    Lconst0,
    Lconst1,
    Fconst0,
    Fconst1,
    Fconst2,
    Dconst0,
    Dconst1,
    Bipush,
    Sipush,
    Ldc,
    LdcW,
    Ldc2W,
    Iload,
    Lload,
    Fload,
    Dload,
    Aload,
    Iload0,
    Iload1,
    Iload2,
    Iload3,
    Lload0,
    Lload1,
    Lload2,
    Lload3,
    Fload0,
    Fload1,
    Fload2,
    Fload3,
    Dload0,
    Dload1,
    Dload2,
    Dload3,
    Aload0,
    Aload1,
    Aload2,
    Aload3,
    Iaload,
    Laload,
    Faload,
    Daload,
    Aaload,
    Baload,
    Caload,
    Saload,
    Istore,
    Lstore,
    Fstore,
    Dstore,
    Astore,
    Istore0,
    Istore1,
    Istore2,
    Istore3,
    Lstore0,
    Lstore1,
    Lstore2,
    Lstore3,
    Fstore0,
    Fstore1,
    Fstore2,
    Fstore3,
    Dstore0,
    Dstore1,
    Dstore2,
    Dstore3,
    Astore0,
    Astore1,
    Astore2,
    Astore3,
    Iastore,
    Lastore,
    Fastore,
    Dastore,
    Aastore,
    Bastore,
    Castore,
    Sastore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,
    Ishl,
    Lshl,
    Ishr,
    Lshr,
    Iushr,
    Lushr,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,
    Iinc,
    I2l,
    I2f,
    I2d,
    L2i,
    L2f,
    L2d,
    F2i,
    F2l,
    F2d,
    D2i,
    D2l,
    D2f,
    I2b,
    I2c,
    I2s,
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
    Ifeq,
    Ifne,
    Iflt,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpeq,
    IfIcmpne,
    IfIcmplt,
    IfIcmpge,
    IfIcmpgt,
    IfIcmple,
    IfAcmpeq,
    IfAcmpne,
    Goto,
    Jsr,
    Ret,
    Tableswitch,
    Lookupswitch,
    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
    Invokevirtual,
    Invokespecial,
    Invokestatic,
    Invokeinterface,
    Invokedynamic,
    New,
    Newarray,
    Anewarray,
    Arraylength,
    Athrow,
    Checkcast,
    Instanceof,
    Monitorenter,
    Monitorexit,
    Wide,
    Multianewarray,
    Ifnull,
    Ifnonnull,
    GotoW,
    JsrW,
    Breakpoint,
    Unknown(u8),
}

impl From<u8> for Mnemonic {
    fn from(value: u8) -> Self {
        match value {
            0 => Mnemonic::Nop,
            1 => Mnemonic::AconstNull,
            2 => Mnemonic::IconstM1,
            3 => Mnemonic::Iconst0,
            4 => Mnemonic::Iconst1,
            5 => Mnemonic::Iconst2,
            6 => Mnemonic::Iconst3,
            7 => Mnemonic::Iconst4,
            8 => Mnemonic::Iconst5,
            9 => Mnemonic::Lconst0,
            10 => Mnemonic::Lconst1,
            11 => Mnemonic::Fconst0,
            12 => Mnemonic::Fconst1,
            13 => Mnemonic::Fconst2,
            14 => Mnemonic::Dconst0,
            15 => Mnemonic::Dconst1,
            16 => Mnemonic::Bipush,
            17 => Mnemonic::Sipush,
            18 => Mnemonic::Ldc,
            19 => Mnemonic::LdcW,
            20 => Mnemonic::Ldc2W,
            21 => Mnemonic::Iload,
            22 => Mnemonic::Lload,
            23 => Mnemonic::Fload,
            24 => Mnemonic::Dload,
            25 => Mnemonic::Aload,
            26 => Mnemonic::Iload0,
            27 => Mnemonic::Iload1,
            28 => Mnemonic::Iload2,
            29 => Mnemonic::Iload3,
            30 => Mnemonic::Lload0,
            31 => Mnemonic::Lload1,
            32 => Mnemonic::Lload2,
            33 => Mnemonic::Lload3,
            34 => Mnemonic::Fload0,
            35 => Mnemonic::Fload1,
            36 => Mnemonic::Fload2,
            37 => Mnemonic::Fload3,
            38 => Mnemonic::Dload0,
            39 => Mnemonic::Dload1,
            40 => Mnemonic::Dload2,
            41 => Mnemonic::Dload3,
            42 => Mnemonic::Aload0,
            43 => Mnemonic::Aload1,
            44 => Mnemonic::Aload2,
            45 => Mnemonic::Aload3,
            46 => Mnemonic::Iaload,
            47 => Mnemonic::Laload,
            48 => Mnemonic::Faload,
            49 => Mnemonic::Daload,
            50 => Mnemonic::Aaload,
            51 => Mnemonic::Baload,
            52 => Mnemonic::Caload,
            53 => Mnemonic::Saload,
            54 => Mnemonic::Istore,
            55 => Mnemonic::Lstore,
            56 => Mnemonic::Fstore,
            57 => Mnemonic::Dstore,
            58 => Mnemonic::Astore,
            59 => Mnemonic::Istore0,
            60 => Mnemonic::Istore1,
            61 => Mnemonic::Istore2,
            62 => Mnemonic::Istore3,
            63 => Mnemonic::Lstore0,
            64 => Mnemonic::Lstore1,
            65 => Mnemonic::Lstore2,
            66 => Mnemonic::Lstore3,
            67 => Mnemonic::Fstore0,
            68 => Mnemonic::Fstore1,
            69 => Mnemonic::Fstore2,
            70 => Mnemonic::Fstore3,
            71 => Mnemonic::Dstore0,
            72 => Mnemonic::Dstore1,
            73 => Mnemonic::Dstore2,
            74 => Mnemonic::Dstore3,
            75 => Mnemonic::Astore0,
            76 => Mnemonic::Astore1,
            77 => Mnemonic::Astore2,
            78 => Mnemonic::Astore3,
            79 => Mnemonic::Iastore,
            80 => Mnemonic::Lastore,
            81 => Mnemonic::Fastore,
            82 => Mnemonic::Dastore,
            83 => Mnemonic::Aastore,
            84 => Mnemonic::Bastore,
            85 => Mnemonic::Castore,
            86 => Mnemonic::Sastore,
            87 => Mnemonic::Pop,
            88 => Mnemonic::Pop2,
            89 => Mnemonic::Dup,
            90 => Mnemonic::DupX1,
            91 => Mnemonic::DupX2,
            92 => Mnemonic::Dup2,
            93 => Mnemonic::Dup2X1,
            94 => Mnemonic::Dup2X2,
            95 => Mnemonic::Swap,
            96 => Mnemonic::Iadd,
            97 => Mnemonic::Ladd,
            98 => Mnemonic::Fadd,
            99 => Mnemonic::Dadd,
            100 => Mnemonic::Isub,
            101 => Mnemonic::Lsub,
            102 => Mnemonic::Fsub,
            103 => Mnemonic::Dsub,
            104 => Mnemonic::Imul,
            105 => Mnemonic::Lmul,
            106 => Mnemonic::Fmul,
            107 => Mnemonic::Dmul,
            108 => Mnemonic::Idiv,
            109 => Mnemonic::Ldiv,
            110 => Mnemonic::Fdiv,
            111 => Mnemonic::Ddiv,
            112 => Mnemonic::Irem,
            113 => Mnemonic::Lrem,
            114 => Mnemonic::Frem,
            115 => Mnemonic::Drem,
            116 => Mnemonic::Ineg,
            117 => Mnemonic::Lneg,
            118 => Mnemonic::Fneg,
            119 => Mnemonic::Dneg,
            120 => Mnemonic::Ishl,
            121 => Mnemonic::Lshl,
            122 => Mnemonic::Ishr,
            123 => Mnemonic::Lshr,
            124 => Mnemonic::Iushr,
            125 => Mnemonic::Lushr,
            126 => Mnemonic::Iand,
            127 => Mnemonic::Land,
            128 => Mnemonic::Ior,
            129 => Mnemonic::Lor,
            130 => Mnemonic::Ixor,
            131 => Mnemonic::Lxor,
            132 => Mnemonic::Iinc,
            133 => Mnemonic::I2l,
            134 => Mnemonic::I2f,
            135 => Mnemonic::I2d,
            136 => Mnemonic::L2i,
            137 => Mnemonic::L2f,
            138 => Mnemonic::L2d,
            139 => Mnemonic::F2i,
            140 => Mnemonic::F2l,
            141 => Mnemonic::F2d,
            142 => Mnemonic::D2i,
            143 => Mnemonic::D2l,
            144 => Mnemonic::D2f,
            145 => Mnemonic::I2b,
            146 => Mnemonic::I2c,
            147 => Mnemonic::I2s,
            148 => Mnemonic::Lcmp,
            149 => Mnemonic::Fcmpl,
            150 => Mnemonic::Fcmpg,
            151 => Mnemonic::Dcmpl,
            152 => Mnemonic::Dcmpg,
            153 => Mnemonic::Ifeq,
            154 => Mnemonic::Ifne,
            155 => Mnemonic::Iflt,
            156 => Mnemonic::Ifge,
            157 => Mnemonic::Ifgt,
            158 => Mnemonic::Ifle,
            159 => Mnemonic::IfIcmpeq,
            160 => Mnemonic::IfIcmpne,
            161 => Mnemonic::IfIcmplt,
            162 => Mnemonic::IfIcmpge,
            163 => Mnemonic::IfIcmpgt,
            164 => Mnemonic::IfIcmple,
            165 => Mnemonic::IfAcmpeq,
            166 => Mnemonic::IfAcmpne,
            167 => Mnemonic::Goto,
            168 => Mnemonic::Jsr,
            169 => Mnemonic::Ret,
            170 => Mnemonic::Tableswitch,
            171 => Mnemonic::Lookupswitch,
            172 => Mnemonic::Ireturn,
            173 => Mnemonic::Lreturn,
            174 => Mnemonic::Freturn,
            175 => Mnemonic::Dreturn,
            176 => Mnemonic::Areturn,
            177 => Mnemonic::Return,
            178 => Mnemonic::Getstatic,
            179 => Mnemonic::Putstatic,
            180 => Mnemonic::Getfield,
            181 => Mnemonic::Putfield,
            182 => Mnemonic::Invokevirtual,
            183 => Mnemonic::Invokespecial,
            184 => Mnemonic::Invokestatic,
            185 => Mnemonic::Invokeinterface,
            186 => Mnemonic::Invokedynamic,
            187 => Mnemonic::New,
            188 => Mnemonic::Newarray,
            189 => Mnemonic::Anewarray,
            190 => Mnemonic::Arraylength,
            191 => Mnemonic::Athrow,
            192 => Mnemonic::Checkcast,
            193 => Mnemonic::Instanceof,
            194 => Mnemonic::Monitorenter,
            195 => Mnemonic::Monitorexit,
            196 => Mnemonic::Wide,
            197 => Mnemonic::Multianewarray,
            198 => Mnemonic::Ifnull,
            199 => Mnemonic::Ifnonnull,
            200 => Mnemonic::GotoW,
            201 => Mnemonic::JsrW,
            202 => Mnemonic::Breakpoint,
            other => Mnemonic::Unknown(other),
        }
    }
}

impl Mnemonic {
    /// The javap spelling of the opcode.
    pub fn name(&self) -> &'static str {
        match self {
            Mnemonic::Nop => "nop",
            Mnemonic::AconstNull => "aconst_null",
            Mnemonic::IconstM1 => "iconst_m1",
            Mnemonic::Iconst0 => "iconst_0",
            Mnemonic::Iconst1 => "iconst_1",
            Mnemonic::Iconst2 => "iconst_2",
            Mnemonic::Iconst3 => "iconst_3",
            Mnemonic::Iconst4 => "iconst_4",
            Mnemonic::Iconst5 => "iconst_5",
            Mnemonic::Lconst0 => "lconst_0",
            Mnemonic::Lconst1 => "lconst_1",
            Mnemonic::Fconst0 => "fconst_0",
            Mnemonic::Fconst1 => "fconst_1",
            Mnemonic::Fconst2 => "fconst_2",
            Mnemonic::Dconst0 => "dconst_0",
            Mnemonic::Dconst1 => "dconst_1",
            Mnemonic::Bipush => "bipush",
            Mnemonic::Sipush => "sipush",
            Mnemonic::Ldc => "ldc",
            Mnemonic::LdcW => "ldc_w",
            Mnemonic::Ldc2W => "ldc2_w",
            Mnemonic::Iload => "iload",
            Mnemonic::Lload => "lload",
            Mnemonic::Fload => "fload",
            Mnemonic::Dload => "dload",
            Mnemonic::Aload => "aload",
            Mnemonic::Iload0 => "iload_0",
            Mnemonic::Iload1 => "iload_1",
            Mnemonic::Iload2 => "iload_2",
            Mnemonic::Iload3 => "iload_3",
            Mnemonic::Lload0 => "lload_0",
            Mnemonic::Lload1 => "lload_1",
            Mnemonic::Lload2 => "lload_2",
            Mnemonic::Lload3 => "lload_3",
            Mnemonic::Fload0 => "fload_0",
            Mnemonic::Fload1 => "fload_1",
            Mnemonic::Fload2 => "fload_2",
            Mnemonic::Fload3 => "fload_3",
            Mnemonic::Dload0 => "dload_0",
            Mnemonic::Dload1 => "dload_1",
            Mnemonic::Dload2 => "dload_2",
            Mnemonic::Dload3 => "dload_3",
            Mnemonic::Aload0 => "aload_0",
            Mnemonic::Aload1 => "aload_1",
            Mnemonic::Aload2 => "aload_2",
            Mnemonic::Aload3 => "aload_3",
            Mnemonic::Iaload => "iaload",
            Mnemonic::Laload => "laload",
            Mnemonic::Faload => "faload",
            Mnemonic::Daload => "daload",
            Mnemonic::Aaload => "aaload",
            Mnemonic::Baload => "baload",
            Mnemonic::Caload => "caload",
            Mnemonic::Saload => "saload",
            Mnemonic::Istore => "istore",
            Mnemonic::Lstore => "lstore",
            Mnemonic::Fstore => "fstore",
            Mnemonic::Dstore => "dstore",
            Mnemonic::Astore => "astore",
            Mnemonic::Istore0 => "istore_0",
            Mnemonic::Istore1 => "istore_1",
            Mnemonic::Istore2 => "istore_2",
            Mnemonic::Istore3 => "istore_3",
            Mnemonic::Lstore0 => "lstore_0",
            Mnemonic::Lstore1 => "lstore_1",
            Mnemonic::Lstore2 => "lstore_2",
            Mnemonic::Lstore3 => "lstore_3",
            Mnemonic::Fstore0 => "fstore_0",
            Mnemonic::Fstore1 => "fstore_1",
            Mnemonic::Fstore2 => "fstore_2",
            Mnemonic::Fstore3 => "fstore_3",
            Mnemonic::Dstore0 => "dstore_0",
            Mnemonic::Dstore1 => "dstore_1",
            Mnemonic::Dstore2 => "dstore_2",
            Mnemonic::Dstore3 => "dstore_3",
            Mnemonic::Astore0 => "astore_0",
            Mnemonic::Astore1 => "astore_1",
            Mnemonic::Astore2 => "astore_2",
            Mnemonic::Astore3 => "astore_3",
            Mnemonic::Iastore => "iastore",
            Mnemonic::Lastore => "lastore",
            Mnemonic::Fastore => "fastore",
            Mnemonic::Dastore => "dastore",
            Mnemonic::Aastore => "aastore",
            Mnemonic::Bastore => "bastore",
            Mnemonic::Castore => "castore",
            Mnemonic::Sastore => "sastore",
            Mnemonic::Pop => "pop",
            Mnemonic::Pop2 => "pop2",
            Mnemonic::Dup => "dup",
            Mnemonic::DupX1 => "dup_x1",
            Mnemonic::DupX2 => "dup_x2",
            Mnemonic::Dup2 => "dup2",
            Mnemonic::Dup2X1 => "dup2_x1",
            Mnemonic::Dup2X2 => "dup2_x2",
            Mnemonic::Swap => "swap",
            Mnemonic::Iadd => "iadd",
            Mnemonic::Ladd => "ladd",
            Mnemonic::Fadd => "fadd",
            Mnemonic::Dadd => "dadd",
            Mnemonic::Isub => "isub",
            Mnemonic::Lsub => "lsub",
            Mnemonic::Fsub => "fsub",
            Mnemonic::Dsub => "dsub",
            Mnemonic::Imul => "imul",
            Mnemonic::Lmul => "lmul",
            Mnemonic::Fmul => "fmul",
            Mnemonic::Dmul => "dmul",
            Mnemonic::Idiv => "idiv",
            Mnemonic::Ldiv => "ldiv",
            Mnemonic::Fdiv => "fdiv",
            Mnemonic::Ddiv => "ddiv",
            Mnemonic::Irem => "irem",
            Mnemonic::Lrem => "lrem",
            Mnemonic::Frem => "frem",
            Mnemonic::Drem => "drem",
            Mnemonic::Ineg => "ineg",
            Mnemonic::Lneg => "lneg",
            Mnemonic::Fneg => "fneg",
            Mnemonic::Dneg => "dneg",
            Mnemonic::Ishl => "ishl",
            Mnemonic::Lshl => "lshl",
            Mnemonic::Ishr => "ishr",
            Mnemonic::Lshr => "lshr",
            Mnemonic::Iushr => "iushr",
            Mnemonic::Lushr => "lushr",
            Mnemonic::Iand => "iand",
            Mnemonic::Land => "land",
            Mnemonic::Ior => "ior",
            Mnemonic::Lor => "lor",
            Mnemonic::Ixor => "ixor",
            Mnemonic::Lxor => "lxor",
            Mnemonic::Iinc => "iinc",
            Mnemonic::I2l => "i2l",
            Mnemonic::I2f => "i2f",
            Mnemonic::I2d => "i2d",
            Mnemonic::L2i => "l2i",
            Mnemonic::L2f => "l2f",
            Mnemonic::L2d => "l2d",
            Mnemonic::F2i => "f2i",
            Mnemonic::F2l => "f2l",
            Mnemonic::F2d => "f2d",
            Mnemonic::D2i => "d2i",
            Mnemonic::D2l => "d2l",
            Mnemonic::D2f => "d2f",
            Mnemonic::I2b => "i2b",
            Mnemonic::I2c => "i2c",
            Mnemonic::I2s => "i2s",
            Mnemonic::Lcmp => "lcmp",
            Mnemonic::Fcmpl => "fcmpl",
            Mnemonic::Fcmpg => "fcmpg",
            Mnemonic::Dcmpl => "dcmpl",
            Mnemonic::Dcmpg => "dcmpg",
            Mnemonic::Ifeq => "ifeq",
            Mnemonic::Ifne => "ifne",
            Mnemonic::Iflt => "iflt",
            Mnemonic::Ifge => "ifge",
            Mnemonic::Ifgt => "ifgt",
            Mnemonic::Ifle => "ifle",
            Mnemonic::IfIcmpeq => "if_icmpeq",
            Mnemonic::IfIcmpne => "if_icmpne",
            Mnemonic::IfIcmplt => "if_icmplt",
            Mnemonic::IfIcmpge => "if_icmpge",
            Mnemonic::IfIcmpgt => "if_icmpgt",
            Mnemonic::IfIcmple => "if_icmple",
            Mnemonic::IfAcmpeq => "if_acmpeq",
            Mnemonic::IfAcmpne => "if_acmpne",
            Mnemonic::Goto => "goto",
            Mnemonic::Jsr => "jsr",
            Mnemonic::Ret => "ret",
            Mnemonic::Tableswitch => "tableswitch",
            Mnemonic::Lookupswitch => "lookupswitch",
            Mnemonic::Ireturn => "ireturn",
            Mnemonic::Lreturn => "lreturn",
            Mnemonic::Freturn => "freturn",
            Mnemonic::Dreturn => "dreturn",
            Mnemonic::Areturn => "areturn",
            Mnemonic::Return => "return",
            Mnemonic::Getstatic => "getstatic",
            Mnemonic::Putstatic => "putstatic",
            Mnemonic::Getfield => "getfield",
            Mnemonic::Putfield => "putfield",
            Mnemonic::Invokevirtual => "invokevirtual",
            Mnemonic::Invokespecial => "invokespecial",
            Mnemonic::Invokestatic => "invokestatic",
            Mnemonic::Invokeinterface => "invokeinterface",
            Mnemonic::Invokedynamic => "invokedynamic",
            Mnemonic::New => "new",
            Mnemonic::Newarray => "newarray",
            Mnemonic::Anewarray => "anewarray",
            Mnemonic::Arraylength => "arraylength",
            Mnemonic::Athrow => "athrow",
            Mnemonic::Checkcast => "checkcast",
            Mnemonic::Instanceof => "instanceof",
            Mnemonic::Monitorenter => "monitorenter",
            Mnemonic::Monitorexit => "monitorexit",
            Mnemonic::Wide => "wide",
            Mnemonic::Multianewarray => "multianewarray",
            Mnemonic::Ifnull => "ifnull",
            Mnemonic::Ifnonnull => "ifnonnull",
            Mnemonic::GotoW => "goto_w",
            Mnemonic::JsrW => "jsr_w",
            Mnemonic::Breakpoint => "breakpoint",
            Mnemonic::Unknown(_) => "unknown",
        }
    }

    /// Conditional branches with a two-way exit.
    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Mnemonic::Ifeq
                | Mnemonic::Ifne
                | Mnemonic::Iflt
                | Mnemonic::Ifge
                | Mnemonic::Ifgt
                | Mnemonic::Ifle
                | Mnemonic::IfIcmpeq
                | Mnemonic::IfIcmpne
                | Mnemonic::IfIcmplt
                | Mnemonic::IfIcmpge
                | Mnemonic::IfIcmpgt
                | Mnemonic::IfIcmple
                | Mnemonic::IfAcmpeq
                | Mnemonic::IfAcmpne
                | Mnemonic::Ifnull
                | Mnemonic::Ifnonnull
        )
    }

    /// Instructions that end a basic block.
    pub fn is_block_terminator(&self) -> bool {
        self.is_conditional_branch()
            || matches!(
                self,
                Mnemonic::Goto
                    | Mnemonic::GotoW
                    | Mnemonic::Jsr
                    | Mnemonic::JsrW
                    | Mnemonic::Ret
                    | Mnemonic::Tableswitch
                    | Mnemonic::Lookupswitch
                    | Mnemonic::Ireturn
                    | Mnemonic::Lreturn
                    | Mnemonic::Freturn
                    | Mnemonic::Dreturn
                    | Mnemonic::Areturn
                    | Mnemonic::Return
                    | Mnemonic::Athrow
            )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mnemonic::Unknown(opcode) => write!(f, "unknown({opcode:#04X})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}
