use super::{
    Code, CodeInstruction, CompareMode, EqComparison, ExceptionHandler, Instruction, InvokeType,
    OrdComparison, ShiftType,
};
use crate::jvm::{BaseType, DecodeErrorKind, Error};
use crate::util::OffsetVec;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

impl<'g> Code<'g> {
    /// Decode the raw code array of a method
    ///
    /// Offsets in the exception table are taken as is: checking that they land on instruction
    /// boundaries is left to the analyses, which report it against the method being analysed.
    pub fn decode(
        bytes: &[u8],
        exception_table: Vec<ExceptionHandler<'g>>,
        max_stack: u16,
        max_locals: u16,
    ) -> Result<Code<'g>, Error> {
        let mut reader = Cursor::new(bytes);
        let mut instructions = OffsetVec::new();

        while (reader.position() as usize) < bytes.len() {
            let offset = reader.position() as usize;
            let instruction = decode_instruction(&mut reader, offset)?;
            let width = reader.position() as usize - offset;
            instructions.push(CodeInstruction { instruction, width });
        }

        Ok(Code {
            instructions,
            max_stack,
            max_locals,
            exception_table,
        })
    }
}

fn decode_instruction(reader: &mut Cursor<&[u8]>, offset: usize) -> Result<Instruction, Error> {
    use Instruction::*;

    let err = |kind: DecodeErrorKind| Error::Decode { offset, kind };
    let truncated = |_: std::io::Error| err(DecodeErrorKind::Truncated);

    // Relative jumps are resolved against the offset of the opcode
    let jump = |relative: i64| -> Result<usize, Error> {
        let target = offset as i64 + relative;
        if target < 0 {
            Err(err(DecodeErrorKind::NegativeBranchTarget(target)))
        } else {
            Ok(target as usize)
        }
    };

    let opcode = reader.read_u8().map_err(truncated)?;
    let instruction = match opcode {
        0x00 => Nop,
        0x01 => AConstNull,
        0x02 => IConstM1,
        0x03 => IConst0,
        0x04 => IConst1,
        0x05 => IConst2,
        0x06 => IConst3,
        0x07 => IConst4,
        0x08 => IConst5,
        0x09 => LConst0,
        0x0a => LConst1,
        0x0b => FConst0,
        0x0c => FConst1,
        0x0d => FConst2,
        0x0e => DConst0,
        0x0f => DConst1,
        0x10 => BiPush(reader.read_i8().map_err(truncated)?),
        0x11 => SiPush(reader.read_i16::<BigEndian>().map_err(truncated)?),
        0x12 => Ldc(reader.read_u8().map_err(truncated)? as u16),
        0x13 => Ldc(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0x14 => Ldc2(reader.read_u16::<BigEndian>().map_err(truncated)?),

        0x15..=0x19 => {
            let idx = reader.read_u8().map_err(truncated)? as u16;
            load_or_store(opcode, idx)
        }
        0x1a..=0x2d => {
            // `xload_<n>`: five types, four indices each
            let which = opcode - 0x1a;
            load_or_store(0x15 + which / 4, (which % 4) as u16)
        }
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x36..=0x3a => {
            let idx = reader.read_u8().map_err(truncated)? as u16;
            load_or_store(opcode, idx)
        }
        0x3b..=0x4e => {
            let which = opcode - 0x3b;
            load_or_store(0x36 + which / 4, (which % 4) as u16)
        }
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => ISh(ShiftType::Left),
        0x79 => LSh(ShiftType::Left),
        0x7a => ISh(ShiftType::ArithmeticRight),
        0x7b => LSh(ShiftType::ArithmeticRight),
        0x7c => ISh(ShiftType::LogicalRight),
        0x7d => LSh(ShiftType::LogicalRight),
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x84 => {
            let idx = reader.read_u8().map_err(truncated)? as u16;
            let diff = reader.read_i8().map_err(truncated)? as i16;
            IInc(idx, diff)
        }
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmp(CompareMode::L),
        0x96 => FCmp(CompareMode::G),
        0x97 => DCmp(CompareMode::L),
        0x98 => DCmp(CompareMode::G),

        0x99..=0xa8 | 0xc6 | 0xc7 => {
            let target = jump(reader.read_i16::<BigEndian>().map_err(truncated)? as i64)?;
            match opcode {
                0x99 => If(OrdComparison::EQ, target),
                0x9a => If(OrdComparison::NE, target),
                0x9b => If(OrdComparison::LT, target),
                0x9c => If(OrdComparison::GE, target),
                0x9d => If(OrdComparison::GT, target),
                0x9e => If(OrdComparison::LE, target),
                0x9f => IfICmp(OrdComparison::EQ, target),
                0xa0 => IfICmp(OrdComparison::NE, target),
                0xa1 => IfICmp(OrdComparison::LT, target),
                0xa2 => IfICmp(OrdComparison::GE, target),
                0xa3 => IfICmp(OrdComparison::GT, target),
                0xa4 => IfICmp(OrdComparison::LE, target),
                0xa5 => IfACmp(EqComparison::EQ, target),
                0xa6 => IfACmp(EqComparison::NE, target),
                0xa7 => Goto(target),
                0xa8 => Jsr(target),
                0xc6 => IfNull(EqComparison::EQ, target),
                _ => IfNull(EqComparison::NE, target),
            }
        }
        0xa9 => Ret(reader.read_u8().map_err(truncated)? as u16),
        0xaa | 0xab => {
            // Skip padding up to the next multiple of four bytes
            while reader.position() % 4 != 0 {
                reader.read_u8().map_err(truncated)?;
            }
            let default = jump(reader.read_i32::<BigEndian>().map_err(truncated)? as i64)?;
            if opcode == 0xaa {
                let low = reader.read_i32::<BigEndian>().map_err(truncated)?;
                let high = reader.read_i32::<BigEndian>().map_err(truncated)?;
                if high < low {
                    return Err(err(DecodeErrorKind::InvalidSwitchBounds { low, high }));
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                let mut targets = Vec::new();
                for _ in 0..count {
                    targets.push(jump(reader.read_i32::<BigEndian>().map_err(truncated)? as i64)?);
                }
                TableSwitch {
                    default,
                    low,
                    targets,
                }
            } else {
                let count = reader.read_i32::<BigEndian>().map_err(truncated)?;
                if count < 0 {
                    return Err(err(DecodeErrorKind::InvalidSwitchBounds {
                        low: 0,
                        high: count,
                    }));
                }
                let mut targets = Vec::new();
                for _ in 0..count {
                    let key = reader.read_i32::<BigEndian>().map_err(truncated)?;
                    let target = jump(reader.read_i32::<BigEndian>().map_err(truncated)? as i64)?;
                    targets.push((key, target));
                }
                LookupSwitch { default, targets }
            }
        }
        0xac => IReturn,
        0xad => LReturn,
        0xae => FReturn,
        0xaf => DReturn,
        0xb0 => AReturn,
        0xb1 => Return,
        0xb2 => GetStatic(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xb3 => PutStatic(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xb4 => GetField(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xb5 => PutField(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xb6 => Invoke(
            InvokeType::Virtual,
            reader.read_u16::<BigEndian>().map_err(truncated)?,
        ),
        0xb7 => Invoke(
            InvokeType::Special,
            reader.read_u16::<BigEndian>().map_err(truncated)?,
        ),
        0xb8 => Invoke(
            InvokeType::Static,
            reader.read_u16::<BigEndian>().map_err(truncated)?,
        ),
        0xb9 => {
            let idx = reader.read_u16::<BigEndian>().map_err(truncated)?;
            let count = reader.read_u8().map_err(truncated)?;
            reader.read_u8().map_err(truncated)?;
            Invoke(InvokeType::Interface(count), idx)
        }
        0xba => {
            let idx = reader.read_u16::<BigEndian>().map_err(truncated)?;
            reader.read_u16::<BigEndian>().map_err(truncated)?;
            InvokeDynamic(idx)
        }
        0xbb => New(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xbc => {
            let atype = reader.read_u8().map_err(truncated)?;
            match BaseType::from_array_type_code(atype) {
                Some(base_type) => NewArray(base_type),
                None => return Err(err(DecodeErrorKind::InvalidArrayType(atype))),
            }
        }
        0xbd => ANewArray(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xbe => ArrayLength,
        0xbf => AThrow,
        0xc0 => CheckCast(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xc1 => InstanceOf(reader.read_u16::<BigEndian>().map_err(truncated)?),
        0xc2 => MonitorEnter,
        0xc3 => MonitorExit,
        0xc4 => {
            let widened = reader.read_u8().map_err(truncated)?;
            let idx = reader.read_u16::<BigEndian>().map_err(truncated)?;
            match widened {
                0x15..=0x19 | 0x36..=0x3a => load_or_store(widened, idx),
                0x84 => IInc(idx, reader.read_i16::<BigEndian>().map_err(truncated)?),
                0xa9 => Ret(idx),
                other => return Err(err(DecodeErrorKind::InvalidWideOpcode(other))),
            }
        }
        0xc5 => {
            let idx = reader.read_u16::<BigEndian>().map_err(truncated)?;
            let dimensions = reader.read_u8().map_err(truncated)?;
            MultiANewArray(idx, dimensions)
        }
        0xc8 => Goto(jump(reader.read_i32::<BigEndian>().map_err(truncated)? as i64)?),
        0xc9 => Jsr(jump(reader.read_i32::<BigEndian>().map_err(truncated)? as i64)?),
        other => return Err(err(DecodeErrorKind::UnknownOpcode(other))),
    };

    Ok(instruction)
}

/// Build a load or store from the opcode of its one-byte-index form
fn load_or_store(opcode: u8, idx: u16) -> Instruction {
    match opcode {
        0x15 => Instruction::ILoad(idx),
        0x16 => Instruction::LLoad(idx),
        0x17 => Instruction::FLoad(idx),
        0x18 => Instruction::DLoad(idx),
        0x19 => Instruction::ALoad(idx),
        0x36 => Instruction::IStore(idx),
        0x37 => Instruction::LStore(idx),
        0x38 => Instruction::FStore(idx),
        0x39 => Instruction::DStore(idx),
        _ => Instruction::AStore(idx),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_simple_method() {
        // static int max(int a, int b) { int t = a; if (b > t) t = b; return t; }
        let bytes = [
            0x1a, // iload_0
            0x3d, // istore_2
            0x1b, // iload_1
            0x1c, // iload_2
            0xa4, 0x00, 0x05, // if_icmple +5
            0x1b, // iload_1
            0x3d, // istore_2
            0x1c, // iload_2
            0xac, // ireturn
        ];
        let code = Code::decode(&bytes, vec![], 2, 3).unwrap();

        let decoded: Vec<(usize, &Instruction)> = code.iter().collect();
        assert_eq!(
            decoded,
            vec![
                (0, &Instruction::ILoad(0)),
                (1, &Instruction::IStore(2)),
                (2, &Instruction::ILoad(1)),
                (3, &Instruction::ILoad(2)),
                (4, &Instruction::IfICmp(OrdComparison::LE, 9)),
                (7, &Instruction::ILoad(1)),
                (8, &Instruction::IStore(2)),
                (9, &Instruction::ILoad(2)),
                (10, &Instruction::IReturn),
            ]
        );
        assert_eq!(code.len(), 11);
    }

    #[test]
    fn decode_wide_and_switches() {
        let bytes = [
            0xc4, 0x15, 0x01, 0x00, // wide iload 256
            0xc4, 0x84, 0x00, 0x05, 0x01, 0x00, // wide iinc 5 256
            0xaa, 0x00, // tableswitch at 10, padded to 12
            0x00, 0x00, 0x00, 0x12, // default +18
            0x00, 0x00, 0x00, 0x01, // low 1
            0x00, 0x00, 0x00, 0x01, // high 1
            0x00, 0x00, 0x00, 0x13, // 1 -> +19
            0xb1, // return
            0xb1, // return
        ];
        let code = Code::decode(&bytes, vec![], 1, 300).unwrap();

        assert_eq!(code.instruction_at(0), Some(&Instruction::ILoad(256)));
        assert_eq!(code.instruction_at(4), Some(&Instruction::IInc(5, 256)));
        assert_eq!(
            code.instruction_at(10),
            Some(&Instruction::TableSwitch {
                default: 28,
                low: 1,
                targets: vec![29],
            })
        );
        assert_eq!(code.next_offset(10), Some(28));
    }

    #[test]
    fn decode_errors() {
        assert!(matches!(
            Code::decode(&[0x10], vec![], 0, 0),
            Err(Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::Truncated
            })
        ));
        assert!(matches!(
            Code::decode(&[0x00, 0xff], vec![], 0, 0),
            Err(Error::Decode {
                offset: 1,
                kind: DecodeErrorKind::UnknownOpcode(0xff)
            })
        ));
        assert!(matches!(
            Code::decode(&[0x00, 0xa7, 0xff, 0xf0], vec![], 0, 0),
            Err(Error::Decode {
                offset: 1,
                kind: DecodeErrorKind::NegativeBranchTarget(-15)
            })
        ));
        assert!(matches!(
            Code::decode(&[0xc4, 0x60, 0x00, 0x00], vec![], 0, 0),
            Err(Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::InvalidWideOpcode(0x60)
            })
        ));
    }
}
