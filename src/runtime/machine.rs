use std::collections::VecDeque;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::compiler::{Instruction, Program};
use crate::error::{Error, Result};

/// Virtual machine limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Number of global memory cells
    pub memory_size: usize,
    /// Maximum number of executed instructions
    pub max_steps: u64,
    /// Maximum number of nested calls
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            memory_size: 65_536,
            max_steps: 100_000_000,
            max_call_depth: 10_000,
        }
    }
}

/// Stack virtual machine
///
/// Global variables live in `memory`. Function frames live on the operand
/// stack and are addressed relative to `bp`; saved base pointers are kept on a
/// separate call stack.
///
/// Address values form one flat space: cells `0..memory_size` are global
/// memory and the operand stack follows, so stack slot `i` has address
/// `memory_size + i`. `SADDR` produces such addresses and `BLOAD`/`BSTORE`
/// accept both regions.
pub struct Machine {
    program: Program,
    options: VmOptions,
    memory: Vec<i64>,
    stack: Vec<i64>,
    frames: Vec<usize>,
    bp: usize,
    pc: usize,
    steps: u64,
    pending_input: VecDeque<String>,
}

impl Machine {
    /// Creates a machine ready to run `program` from address 0
    pub fn new(program: Program, options: VmOptions) -> Self {
        Self {
            memory: vec![0; options.memory_size],
            program,
            options,
            stack: Vec::new(),
            frames: Vec::new(),
            bp: 0,
            pc: 0,
            steps: 0,
            pending_input: VecDeque::new(),
        }
    }

    /// Runs until `STOP`, reading `READ` values from `input` and writing `PRINT` output
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        loop {
            let instr = self.fetch()?;
            let pc = self.pc;

            self.steps += 1;
            if self.steps > self.options.max_steps {
                return Err(Error::ExecutionLimitExceeded {
                    limit: self.options.max_steps,
                });
            }
            tracing::trace!(pc, %instr, depth = self.frames.len(), "step");

            self.pc += 1;
            match instr {
                Instruction::Nop => {}
                Instruction::Stop => {
                    tracing::debug!(pc, steps = self.steps, "machine halted");
                    output.flush()?;
                    return Ok(());
                }

                Instruction::Push(value) => self.stack.push(value),
                Instruction::Pop => {
                    self.pop(pc)?;
                }

                Instruction::Load(address) => {
                    let cell = self.memory_index(address, pc)?;
                    self.stack.push(self.memory[cell]);
                }
                Instruction::Store(address) => {
                    let value = self.pop(pc)?;
                    let cell = self.memory_index(address, pc)?;
                    self.memory[cell] = value;
                }
                Instruction::BLoad(offset) => {
                    let base = self.pop(pc)?;
                    let value = *self.cell_mut(base.wrapping_add(offset), pc)?;
                    self.stack.push(value);
                }
                Instruction::BStore(offset) => {
                    let value = self.pop(pc)?;
                    let base = self.pop(pc)?;
                    *self.cell_mut(base.wrapping_add(offset), pc)? = value;
                }

                Instruction::SLoad(offset) => {
                    let slot = self.frame_index(offset, pc)?;
                    self.stack.push(self.stack[slot]);
                }
                Instruction::SStore(offset) => {
                    let value = self.pop(pc)?;
                    let slot = self.frame_index(offset, pc)?;
                    self.stack[slot] = value;
                }
                Instruction::SbLoad(offset) => {
                    let base = self.pop(pc)?;
                    let slot = self.frame_index(base.wrapping_add(offset), pc)?;
                    self.stack.push(self.stack[slot]);
                }
                Instruction::SbStore(offset) => {
                    let value = self.pop(pc)?;
                    let base = self.pop(pc)?;
                    let slot = self.frame_index(base.wrapping_add(offset), pc)?;
                    self.stack[slot] = value;
                }
                Instruction::SAddr(offset) => {
                    let slot = self.frame_index(offset, pc)?;
                    self.stack.push((self.memory.len() + slot) as i64);
                }

                Instruction::Add => self.binary(pc, |a, b| Ok(a.wrapping_add(b)))?,
                Instruction::Sub => self.binary(pc, |a, b| Ok(a.wrapping_sub(b)))?,
                Instruction::Mult => self.binary(pc, |a, b| Ok(a.wrapping_mul(b)))?,
                Instruction::Div => self.binary(pc, |a, b| {
                    if b == 0 {
                        Err(Error::DivisionByZero { pc })
                    } else {
                        Ok(a.wrapping_div(b))
                    }
                })?,
                Instruction::Invert => {
                    let value = self.pop(pc)?;
                    self.stack.push(value.wrapping_neg());
                }
                Instruction::Compare(relation) => {
                    self.binary(pc, |a, b| Ok(relation.holds(a, b) as i64))?
                }

                Instruction::Jump(target) => self.jump(target as i64)?,
                Instruction::JumpNo(target) => {
                    if self.pop(pc)? == 0 {
                        self.jump(target as i64)?;
                    }
                }

                Instruction::Input => {
                    let value = self.read_integer(input)?;
                    self.stack.push(value);
                }
                Instruction::Print => {
                    let value = self.pop(pc)?;
                    writeln!(output, "{}", value)?;
                }

                Instruction::Bp(count) => {
                    if self.frames.len() >= self.options.max_call_depth {
                        return Err(Error::CallDepthExceeded {
                            limit: self.options.max_call_depth,
                        });
                    }
                    let base = usize::try_from(count)
                        .ok()
                        .and_then(|n| self.stack.len().checked_sub(n))
                        .ok_or(Error::StackUnderflow { pc })?;
                    self.frames.push(self.bp);
                    self.bp = base;
                }
                Instruction::SJump => {
                    let target = self.pop(pc)?;
                    self.bp = self.frames.pop().ok_or(Error::ReturnWithoutCall { pc })?;
                    self.jump(target)?;
                }
            }
        }
    }

    /// Global memory
    pub fn memory(&self) -> &[i64] {
        &self.memory
    }

    /// Operand stack, bottom first
    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    /// Number of instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn fetch(&self) -> Result<Instruction> {
        self.program
            .instructions
            .get(self.pc)
            .copied()
            .ok_or(Error::InvalidJump {
                target: self.pc as i64,
            })
    }

    fn jump(&mut self, target: i64) -> Result<()> {
        match usize::try_from(target) {
            Ok(address) if address < self.program.len() => {
                self.pc = address;
                Ok(())
            }
            _ => Err(Error::InvalidJump { target }),
        }
    }

    fn pop(&mut self, pc: usize) -> Result<i64> {
        self.stack.pop().ok_or(Error::StackUnderflow { pc })
    }

    /// Pops rhs then lhs and pushes `op(lhs, rhs)`
    fn binary(&mut self, pc: usize, op: impl FnOnce(i64, i64) -> Result<i64>) -> Result<()> {
        let rhs = self.pop(pc)?;
        let lhs = self.pop(pc)?;
        self.stack.push(op(lhs, rhs)?);
        Ok(())
    }

    fn memory_index(&self, address: i64, pc: usize) -> Result<usize> {
        usize::try_from(address)
            .ok()
            .filter(|&cell| cell < self.memory.len())
            .ok_or(Error::InvalidAddress { address, pc })
    }

    /// Cell behind an absolute address, in global memory or on the stack
    fn cell_mut(&mut self, address: i64, pc: usize) -> Result<&mut i64> {
        let memory_len = self.memory.len();
        match usize::try_from(address) {
            Ok(cell) if cell < memory_len => Ok(&mut self.memory[cell]),
            Ok(cell) => self
                .stack
                .get_mut(cell - memory_len)
                .ok_or(Error::InvalidAddress { address, pc }),
            Err(_) => Err(Error::InvalidAddress { address, pc }),
        }
    }

    fn frame_index(&self, offset: i64, pc: usize) -> Result<usize> {
        let address = (self.bp as i64).wrapping_add(offset);
        usize::try_from(address)
            .ok()
            .filter(|&slot| slot < self.stack.len())
            .ok_or(Error::InvalidAddress { address, pc })
    }

    /// Next whitespace-separated integer from `input`
    fn read_integer<R: BufRead>(&mut self, input: &mut R) -> Result<i64> {
        loop {
            if let Some(word) = self.pending_input.pop_front() {
                return word.parse().map_err(|_| Error::InputError {
                    message: format!("'{}' is not an integer", word),
                });
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(Error::InputError {
                    message: "unexpected end of input".to_string(),
                });
            }
            self.pending_input
                .extend(line.split_whitespace().map(str::to_string));
        }
    }
}
