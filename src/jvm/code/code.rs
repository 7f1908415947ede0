use super::Instruction;
use crate::jvm::class_graph::{ClassRef, MethodId};
use crate::jvm::{AssembleErrorKind, ConstantPool, Error};
use crate::util::{Offset, OffsetVec, Width};

/// Instruction along with the number of bytes it took up in the code array
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeInstruction {
    pub instruction: Instruction,
    pub width: usize,
}

impl Width for CodeInstruction {
    fn width(&self) -> usize {
        self.width
    }
}

/// Entry in a method's exception table
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionHandler<'g> {
    /// Start of the protected range (inclusive)
    pub start: usize,

    /// End of the protected range (exclusive)
    pub end: usize,

    /// Start of the handler code
    pub handler: usize,

    /// Type of exception caught (`None` catches everything, as in a `finally`)
    pub catch_type: Option<ClassRef<'g>>,
}

impl<'g> ExceptionHandler<'g> {
    /// Does this handler protect the instruction at the given offset?
    pub fn covers(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Decoded `Code` attribute of a method
#[derive(Clone, Debug)]
pub struct Code<'g> {
    /// Instructions, indexed by their bytecode offset
    pub instructions: OffsetVec<CodeInstruction>,

    pub max_stack: u16,

    pub max_locals: u16,

    /// Exception handlers, in priority order
    pub exception_table: Vec<ExceptionHandler<'g>>,
}

impl<'g> Code<'g> {
    /// Lay out instructions into a method body
    ///
    /// Branch targets in the instructions and the `start`/`end`/`handler` fields of the exception
    /// handlers are interpreted as _indices_ into the instruction list, and get rewritten into
    /// bytecode offsets. An `end` equal to the number of instructions means the end of the code.
    /// Every instruction gets its shortest encoding.
    pub fn assemble(
        instructions: Vec<Instruction>,
        exception_table: Vec<ExceptionHandler<'g>>,
        max_stack: u16,
        max_locals: u16,
    ) -> Result<Code<'g>, Error> {
        // Switch padding depends on the offset, so offsets get computed one after the other
        let mut offsets: Vec<usize> = Vec::with_capacity(instructions.len() + 1);
        let mut next_offset = 0;
        for instruction in &instructions {
            offsets.push(next_offset);
            next_offset += instruction.encoded_width(next_offset);
        }
        offsets.push(next_offset);

        let mut laid_out = OffsetVec::new();
        for (index, instruction) in instructions.iter().enumerate() {
            let instruction = instruction.map_targets(|target| {
                offsets
                    .get(target)
                    .copied()
                    .filter(|_| target < instructions.len())
                    .ok_or(Error::Assemble {
                        index,
                        kind: AssembleErrorKind::MissingBranchTarget(target),
                    })
            })?;
            let width = offsets[index + 1] - offsets[index];
            laid_out.push(CodeInstruction { instruction, width });
        }

        let exception_table = exception_table
            .into_iter()
            .enumerate()
            .map(|(index, handler)| {
                let lookup = |target: usize, allow_end: bool| {
                    let in_range = target < instructions.len()
                        || (allow_end && target == instructions.len());
                    offsets
                        .get(target)
                        .copied()
                        .filter(|_| in_range)
                        .ok_or(Error::Assemble {
                            index,
                            kind: AssembleErrorKind::MissingHandlerTarget(target),
                        })
                };
                Ok(ExceptionHandler {
                    start: lookup(handler.start, false)?,
                    end: lookup(handler.end, true)?,
                    handler: lookup(handler.handler, false)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Code {
            instructions: laid_out,
            max_stack,
            max_locals,
            exception_table,
        })
    }

    /// Instruction starting exactly at the given offset
    pub fn instruction_at(&self, offset: usize) -> Option<&Instruction> {
        self.instructions
            .get_offset(Offset(offset))
            .ok()
            .map(|code_instruction| &code_instruction.instruction)
    }

    /// Offset of the instruction following the one at the given offset
    ///
    /// For the last instruction, this is the length of the code.
    pub fn next_offset(&self, offset: usize) -> Option<usize> {
        self.instructions
            .next_offset(Offset(offset))
            .map(|Offset(next)| next)
    }

    /// Length of the code array, in bytes
    pub fn len(&self) -> usize {
        self.instructions.offset_len().0
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over instructions along with their offsets
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Instruction)> + '_ {
        self.instructions
            .iter()
            .map(|(Offset(offset), _, code_instruction)| (offset, &code_instruction.instruction))
    }

    /// Exception handlers whose range includes the given offset, in priority order
    pub fn handlers_covering(
        &self,
        offset: usize,
    ) -> impl Iterator<Item = &ExceptionHandler<'g>> + '_ {
        self.exception_table
            .iter()
            .filter(move |handler| handler.covers(offset))
    }
}

/// Everything the analyses need to know about one method body
#[derive(Clone, Copy)]
pub struct MethodBody<'a, 'g> {
    /// Method whose body this is
    pub method: MethodId<'g>,

    pub code: &'a Code<'g>,

    /// Constant pool of the declaring class
    pub constants: &'a ConstantPool<'g>,
}

impl<'a, 'g> MethodBody<'a, 'g> {
    pub fn new(
        method: MethodId<'g>,
        code: &'a Code<'g>,
        constants: &'a ConstantPool<'g>,
    ) -> MethodBody<'a, 'g> {
        MethodBody {
            method,
            code,
            constants,
        }
    }

    pub fn is_static(&self) -> bool {
        self.method.is_static()
    }

    /// Name of the method, for diagnostics
    pub fn name(&self) -> String {
        format!("{:?}", self.method.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{EqComparison, Instruction::*, OrdComparison};
    use crate::jvm::{BinaryName, Name};

    #[test]
    fn assemble_offsets() {
        // 0: iload_0, 1: ifeq, 4: iconst_1, 5: tableswitch (2 bytes of padding), 28: iconst_0,
        // 29: ireturn
        let code = Code::assemble(
            vec![
                ILoad(0),
                If(OrdComparison::EQ, 4),
                IConst1,
                TableSwitch {
                    default: 5,
                    low: 0,
                    targets: vec![4, 5],
                },
                IConst0,
                IReturn,
            ],
            vec![ExceptionHandler {
                start: 0,
                end: 6,
                handler: 5,
                catch_type: None,
            }],
            2,
            1,
        )
        .unwrap();

        let offsets: Vec<usize> = code.iter().map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![0, 1, 4, 5, 28, 29]);
        assert_eq!(code.len(), 30);
        assert_eq!(code.instruction_at(1), Some(&If(OrdComparison::EQ, 28)));
        assert_eq!(
            code.instruction_at(5),
            Some(&TableSwitch {
                default: 29,
                low: 0,
                targets: vec![28, 29],
            })
        );
        assert_eq!(code.instruction_at(2), None, "middle of the `ifeq`");
        assert_eq!(code.next_offset(5), Some(28));
        assert_eq!(code.next_offset(29), Some(30));
        assert_eq!(code.exception_table[0].end, 30);
        assert_eq!(code.exception_table[0].handler, 29);
        assert_eq!(code.handlers_covering(29).count(), 1);
        assert_eq!(code.handlers_covering(30).count(), 0);
    }

    #[test]
    fn assemble_bad_targets() {
        let result = Code::assemble(vec![IfNull(EqComparison::EQ, 3), Return], vec![], 1, 1);
        assert!(matches!(
            result,
            Err(Error::Assemble {
                index: 0,
                kind: AssembleErrorKind::MissingBranchTarget(3)
            })
        ));

        let result = Code::assemble(
            vec![Nop, Return],
            vec![ExceptionHandler {
                start: 0,
                end: 1,
                handler: 2,
                catch_type: Some(ClassRef::unresolved(BinaryName::from_str("a/B").unwrap())),
            }],
            1,
            0,
        );
        assert!(matches!(
            result,
            Err(Error::Assemble {
                index: 0,
                kind: AssembleErrorKind::MissingHandlerTarget(2)
            })
        ));
    }
}
