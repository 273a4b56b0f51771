//! # Stack Machine Code Generation
//!
//! Instruction set of the Milan virtual machine and the append-only,
//! patchable instruction sink the translator writes into.
//!
//! ## Listing format
//!
//! A flushed program is one instruction per line, numbered from zero:
//!
//! ```text
//! 0:	JUMP	1
//! 1:	PUSH	3
//! 2:	STORE	0
//! 3:	LOAD	0
//! 4:	PRINT
//! 5:	STOP
//! ```
//!
//! ## Addressing modes
//!
//! Global variables live at absolute memory cells (`LOAD`/`STORE`).
//! Parameters and locals live on the operand stack and are addressed relative
//! to the base pointer (`SLOAD`/`SSTORE`, `SBLOAD`/`SBSTORE` for elements of
//! local arrays). [`AddressingMode`] picks the right variant.
//!
//! Address values are always absolute. The machine maps its operand stack
//! directly above global memory, `SADDR k` pushes the absolute address of
//! frame slot `k`, and `BLOAD`/`BSTORE` reach either region. A reference taken
//! in one scope therefore stays valid in a callee.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lexer::Comparison;

/// Stack machine instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // Control
    /// No operation (also the placeholder written by `reserve`)
    Nop,
    /// Halt the machine
    Stop,

    // Stack
    /// Push a constant
    Push(i64),
    /// Discard the top of the stack
    Pop,

    // Absolute memory
    /// Push `memory[addr]`
    Load(i64),
    /// Pop into `memory[addr]`
    Store(i64),
    /// Pop an address, push `memory[address + offset]`
    BLoad(i64),
    /// Pop a value, pop an address, store at `memory[address + offset]`
    BStore(i64),

    // Frame-relative (base pointer) memory
    /// Push `stack[bp + offset]`
    SLoad(i64),
    /// Pop into `stack[bp + offset]`
    SStore(i64),
    /// Pop an offset, push `stack[bp + offset + k]`
    SbLoad(i64),
    /// Pop a value, pop an offset, store at `stack[bp + offset + k]`
    SbStore(i64),
    /// Push the absolute address of `stack[bp + offset]`
    SAddr(i64),

    // Arithmetic (rhs on top)
    /// lhs + rhs
    Add,
    /// lhs - rhs
    Sub,
    /// lhs * rhs
    Mult,
    /// lhs / rhs
    Div,
    /// Negate the top of the stack
    Invert,
    /// Pop rhs and lhs, push 1 if the relation holds and 0 otherwise
    Compare(Comparison),

    // Jumps
    /// Unconditional jump
    Jump(usize),
    /// Pop a value, jump when it is zero
    JumpNo(usize),

    // I/O
    /// Read an integer and push it
    Input,
    /// Pop and print
    Print,

    // Calls
    /// Save the base pointer on the call stack and point it `n` cells below the top
    Bp(i64),
    /// Pop the return address, restore the saved base pointer and jump
    SJump,
}

impl Instruction {
    /// Upper-case mnemonic used in listings
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "NOP",
            Instruction::Stop => "STOP",
            Instruction::Push(_) => "PUSH",
            Instruction::Pop => "POP",
            Instruction::Load(_) => "LOAD",
            Instruction::Store(_) => "STORE",
            Instruction::BLoad(_) => "BLOAD",
            Instruction::BStore(_) => "BSTORE",
            Instruction::SLoad(_) => "SLOAD",
            Instruction::SStore(_) => "SSTORE",
            Instruction::SbLoad(_) => "SBLOAD",
            Instruction::SbStore(_) => "SBSTORE",
            Instruction::SAddr(_) => "SADDR",
            Instruction::Add => "ADD",
            Instruction::Sub => "SUB",
            Instruction::Mult => "MULT",
            Instruction::Div => "DIV",
            Instruction::Invert => "INVERT",
            Instruction::Compare(_) => "COMPARE",
            Instruction::Jump(_) => "JUMP",
            Instruction::JumpNo(_) => "JUMP_NO",
            Instruction::Input => "INPUT",
            Instruction::Print => "PRINT",
            Instruction::Bp(_) => "BP",
            Instruction::SJump => "SJUMP",
        }
    }

    /// Operand, if the instruction carries one
    pub fn operand(&self) -> Option<i64> {
        match *self {
            Instruction::Push(v)
            | Instruction::Load(v)
            | Instruction::Store(v)
            | Instruction::BLoad(v)
            | Instruction::BStore(v)
            | Instruction::SLoad(v)
            | Instruction::SStore(v)
            | Instruction::SbLoad(v)
            | Instruction::SbStore(v)
            | Instruction::SAddr(v)
            | Instruction::Bp(v) => Some(v),
            Instruction::Compare(cmp) => Some(cmp.code()),
            Instruction::Jump(target) | Instruction::JumpNo(target) => Some(target as i64),
            _ => None,
        }
    }

    /// Builds an instruction from its mnemonic and operand
    pub fn from_parts(mnemonic: &str, operand: Option<i64>) -> std::result::Result<Self, String> {
        let arg = |name: &str| operand.ok_or_else(|| format!("{} requires an operand", name));
        let target = |name: &str| -> std::result::Result<usize, String> {
            let v = arg(name)?;
            usize::try_from(v).map_err(|_| format!("{} target {} is negative", name, v))
        };
        let instr = match mnemonic {
            "NOP" => Instruction::Nop,
            "STOP" => Instruction::Stop,
            "PUSH" => Instruction::Push(arg(mnemonic)?),
            "POP" => Instruction::Pop,
            "LOAD" => Instruction::Load(arg(mnemonic)?),
            "STORE" => Instruction::Store(arg(mnemonic)?),
            "BLOAD" => Instruction::BLoad(arg(mnemonic)?),
            "BSTORE" => Instruction::BStore(arg(mnemonic)?),
            "SLOAD" => Instruction::SLoad(arg(mnemonic)?),
            "SSTORE" => Instruction::SStore(arg(mnemonic)?),
            "SBLOAD" => Instruction::SbLoad(arg(mnemonic)?),
            "SBSTORE" => Instruction::SbStore(arg(mnemonic)?),
            "SADDR" => Instruction::SAddr(arg(mnemonic)?),
            "ADD" => Instruction::Add,
            "SUB" => Instruction::Sub,
            "MULT" => Instruction::Mult,
            "DIV" => Instruction::Div,
            "INVERT" => Instruction::Invert,
            "COMPARE" => {
                let code = arg(mnemonic)?;
                Instruction::Compare(
                    Comparison::from_code(code)
                        .ok_or_else(|| format!("unknown comparison code {}", code))?,
                )
            }
            "JUMP" => Instruction::Jump(target(mnemonic)?),
            "JUMP_NO" => Instruction::JumpNo(target(mnemonic)?),
            "INPUT" => Instruction::Input,
            "PRINT" => Instruction::Print,
            "BP" => Instruction::Bp(arg(mnemonic)?),
            "SJUMP" => Instruction::SJump,
            other => return Err(format!("unknown instruction '{}'", other)),
        };
        if instr.operand().is_none() && operand.is_some() {
            return Err(format!("{} takes no operand", mnemonic));
        }
        Ok(instr)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand() {
            Some(operand) => write!(f, "{}\t{}", self.mnemonic(), operand),
            None => write!(f, "{}", self.mnemonic()),
        }
    }
}

/// Where variable addresses are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Global scope: absolute memory cells
    Absolute,
    /// Function scope: offsets from the base pointer
    FrameRelative,
}

impl AddressingMode {
    /// Push the variable at `address`
    pub fn load(self, address: i64) -> Instruction {
        match self {
            AddressingMode::Absolute => Instruction::Load(address),
            AddressingMode::FrameRelative => Instruction::SLoad(address),
        }
    }

    /// Pop into the variable at `address`
    pub fn store(self, address: i64) -> Instruction {
        match self {
            AddressingMode::Absolute => Instruction::Store(address),
            AddressingMode::FrameRelative => Instruction::SStore(address),
        }
    }

    /// Push the absolute address of the variable at `address`
    pub fn address_of(self, address: i64) -> Instruction {
        match self {
            AddressingMode::Absolute => Instruction::Push(address),
            AddressingMode::FrameRelative => Instruction::SAddr(address),
        }
    }

    /// Pop an address and push the cell at `address + offset`
    pub fn load_indirect(self, offset: i64) -> Instruction {
        match self {
            AddressingMode::Absolute => Instruction::BLoad(offset),
            AddressingMode::FrameRelative => Instruction::SbLoad(offset),
        }
    }

    /// Pop a value and an address, store the value at `address + offset`
    pub fn store_indirect(self, offset: i64) -> Instruction {
        match self {
            AddressingMode::Absolute => Instruction::BStore(offset),
            AddressingMode::FrameRelative => Instruction::SbStore(offset),
        }
    }
}

/// Handle to an instruction slot awaiting a patch
///
/// Patching consumes the handle, so a slot cannot be written twice through it.
/// Handles come only from [`InstructionSink::reserve`] on [`CodeGen`]; they
/// cannot be built from a raw address outside this crate:
///
/// ```compile_fail
/// let slot = milanc::compiler::Reserved::at(0);
/// ```
#[must_use = "a reserved slot must be patched with `emit_at`"]
#[derive(Debug, PartialEq, Eq)]
pub struct Reserved(usize);

impl Reserved {
    /// Wraps a slot address; only sinks in this crate hand these out
    pub(crate) fn at(address: usize) -> Self {
        Reserved(address)
    }

    /// Address of the reserved slot
    pub fn address(&self) -> usize {
        self.0
    }
}

/// Append-only instruction stream with patchable reserved slots
pub trait InstructionSink {
    /// Appends an instruction and returns its address
    fn emit(&mut self, instr: Instruction) -> usize;

    /// Appends a placeholder and returns a handle for patching it later
    fn reserve(&mut self) -> Reserved;

    /// Overwrites a reserved slot
    fn emit_at(&mut self, slot: Reserved, instr: Instruction);

    /// Address the next emitted instruction will get
    fn current_address(&self) -> usize;

    /// Writes the finished program to its destination
    fn flush(&mut self) -> Result<()>;
}

/// A finished instruction sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Instructions, indexed by address
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Wraps an instruction vector
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True for a program without instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (address, instr) in self.instructions.iter().enumerate() {
            writeln!(f, "{}:\t{}", address, instr)?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = Error;

    /// Parses a listing written by [`CodeGen::flush`]
    ///
    /// Blank lines and `#` comments are ignored; the `N:` prefix is optional
    /// but, when present, must match the instruction's position.
    fn from_str(text: &str) -> Result<Self> {
        let mut instructions = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let body = match line.split_once(':') {
                Some((label, rest)) => {
                    let address: usize = label
                        .trim()
                        .parse()
                        .map_err(|_| Error::listing(line_no, format!("bad address '{}'", label)))?;
                    if address != instructions.len() {
                        return Err(Error::listing(
                            line_no,
                            format!("expected address {}, found {}", instructions.len(), address),
                        ));
                    }
                    rest
                }
                None => line,
            };

            let mut parts = body.split_whitespace();
            let mnemonic = parts
                .next()
                .ok_or_else(|| Error::listing(line_no, "missing instruction"))?;
            let operand = match parts.next() {
                Some(text) => Some(
                    text.parse::<i64>()
                        .map_err(|_| Error::listing(line_no, format!("bad operand '{}'", text)))?,
                ),
                None => None,
            };
            if let Some(extra) = parts.next() {
                return Err(Error::listing(line_no, format!("unexpected '{}'", extra)));
            }

            let instr = Instruction::from_parts(&mnemonic.to_ascii_uppercase(), operand)
                .map_err(|msg| Error::listing(line_no, msg))?;
            instructions.push(instr);
        }

        Ok(Program { instructions })
    }
}

/// Buffered [`InstructionSink`] that writes a listing to `W` on flush
pub struct CodeGen<W: Write> {
    /// Emitted instructions
    instructions: Vec<Instruction>,
    /// Reserved slots not yet patched
    pending: BTreeSet<usize>,
    /// Listing destination
    output: W,
    /// Number of completed flushes
    flushes: usize,
}

impl CodeGen<Vec<u8>> {
    /// Creates a sink whose listing is kept in memory
    pub fn buffered() -> Self {
        Self::with_writer(Vec::new())
    }

    /// The listing written so far, as text
    pub fn listing(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl<W: Write> CodeGen<W> {
    /// Creates a sink flushing into `output`
    pub fn with_writer(output: W) -> Self {
        Self {
            instructions: Vec::new(),
            pending: BTreeSet::new(),
            output,
            flushes: 0,
        }
    }

    /// Instructions emitted so far
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of reserved slots that were never patched
    pub fn unpatched(&self) -> usize {
        self.pending.len()
    }

    /// How many times the program was flushed
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Consumes the sink, returning the program and the writer
    pub fn into_parts(self) -> (Program, W) {
        (Program::new(self.instructions), self.output)
    }
}

impl<W: Write> InstructionSink for CodeGen<W> {
    fn emit(&mut self, instr: Instruction) -> usize {
        self.instructions.push(instr);
        self.instructions.len() - 1
    }

    fn reserve(&mut self) -> Reserved {
        let address = self.emit(Instruction::Nop);
        self.pending.insert(address);
        Reserved::at(address)
    }

    fn emit_at(&mut self, slot: Reserved, instr: Instruction) {
        let address = slot.address();
        debug_assert!(
            self.pending.contains(&address),
            "slot {} was not reserved by this sink",
            address
        );
        self.pending.remove(&address);
        self.instructions[address] = instr;
    }

    fn current_address(&self) -> usize {
        self.instructions.len()
    }

    fn flush(&mut self) -> Result<()> {
        let program = Program::new(self.instructions.clone());
        write!(self.output, "{}", program)?;
        self.output.flush()?;
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_patch() {
        let mut gen = CodeGen::buffered();
        let slot = gen.reserve();
        assert_eq!(gen.unpatched(), 1);
        gen.emit(Instruction::Push(1));
        let target = gen.current_address();
        gen.emit_at(slot, Instruction::Jump(target));
        assert_eq!(gen.unpatched(), 0);
        assert_eq!(
            gen.instructions(),
            &[Instruction::Jump(2), Instruction::Push(1)]
        );
    }

    #[test]
    #[should_panic]
    fn test_patching_a_foreign_slot_panics() {
        let mut other = CodeGen::buffered();
        other.emit(Instruction::Nop);
        other.emit(Instruction::Nop);
        let slot = other.reserve();

        let mut gen = CodeGen::buffered();
        gen.emit_at(slot, Instruction::Stop);
    }

    #[test]
    fn test_addressing_modes() {
        use AddressingMode::*;
        assert_eq!(Absolute.load(3), Instruction::Load(3));
        assert_eq!(FrameRelative.load(3), Instruction::SLoad(3));
        assert_eq!(Absolute.store(-1), Instruction::Store(-1));
        assert_eq!(FrameRelative.store(-1), Instruction::SStore(-1));
        assert_eq!(Absolute.load_indirect(0), Instruction::BLoad(0));
        assert_eq!(FrameRelative.store_indirect(4), Instruction::SbStore(4));
        assert_eq!(Absolute.address_of(2), Instruction::Push(2));
        assert_eq!(FrameRelative.address_of(2), Instruction::SAddr(2));
    }

    #[test]
    fn test_flush_writes_listing() {
        let mut gen = CodeGen::buffered();
        gen.emit(Instruction::Push(3));
        gen.emit(Instruction::Compare(Comparison::Ge));
        gen.emit(Instruction::Stop);
        gen.flush().unwrap();
        assert_eq!(gen.listing(), "0:\tPUSH\t3\n1:\tCOMPARE\t5\n2:\tSTOP\n");
        assert_eq!(gen.flush_count(), 1);
    }

    #[test]
    fn test_listing_parses_back() {
        let program = Program::new(vec![
            Instruction::Jump(4),
            Instruction::SLoad(-2),
            Instruction::SAddr(1),
            Instruction::SJump,
            Instruction::JumpNo(0),
            Instruction::Stop,
        ]);
        let parsed: Program = program.to_string().parse().unwrap();
        assert_eq!(parsed, program);
    }

    #[test]
    fn test_listing_errors() {
        assert!(matches!(
            "0:\tPUSH".parse::<Program>(),
            Err(Error::ListingError { line: 1, .. })
        ));
        assert!(matches!(
            "1:\tSTOP".parse::<Program>(),
            Err(Error::ListingError { line: 1, .. })
        ));
        assert!(matches!(
            "STOP\nFLY 2".parse::<Program>(),
            Err(Error::ListingError { line: 2, .. })
        ));
        assert!(matches!(
            "ADD 1".parse::<Program>(),
            Err(Error::ListingError { line: 1, .. })
        ));
    }

    #[test]
    fn test_listing_without_labels_and_comments() {
        let program: Program = "# demo\npush 2\n\nprint\nstop\n".parse().unwrap();
        assert_eq!(
            program.instructions,
            vec![Instruction::Push(2), Instruction::Print, Instruction::Stop]
        );
    }
}
