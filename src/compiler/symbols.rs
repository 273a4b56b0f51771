//! Symbol and function tables
//!
//! Variables live in one of two scopes: the global table (absolute memory
//! addresses) or the table of the function being translated (offsets from the
//! frame's base pointer). [`ScopeStack`] owns both and decides which one is
//! active; [`FunctionTable`] records every finished function declaration.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codegen::AddressingMode;

/// Frame offset of a function's result slot, relative to its base pointer
pub const RESULT_SLOT: i64 = -2;

/// Frame offset of the return address, relative to the base pointer
pub const RETURN_SLOT: i64 = -1;

/// Static type of a variable or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Plain integer
    Integer,
    /// A memory location (reference, array base, by-reference parameter)
    Address,
}

impl ValueType {
    /// Type of `lhs op rhs`: an address stays an address under arithmetic
    pub fn combine(self, other: ValueType) -> ValueType {
        if self == ValueType::Address || other == ValueType::Address {
            ValueType::Address
        } else {
            ValueType::Integer
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "INTEGER"),
            ValueType::Address => write!(f, "ADDRESS"),
        }
    }
}

/// What kind of storage a name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Storage {
    /// A single cell
    Scalar,
    /// `len` contiguous cells starting at the variable's address
    Array(usize),
}

/// A named storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Absolute address (global scope) or base-pointer offset (function scope)
    pub address: i64,
    /// Type fixed at first assignment or declaration
    pub ty: ValueType,
    /// Scalar or array
    pub storage: Storage,
}

impl Variable {
    /// True for array bases
    pub fn is_array(&self) -> bool {
        matches!(self.storage, Storage::Array(_))
    }
}

/// Outcome of [`SymbolTable::resolve_or_declare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    /// The name was unknown and has just been allocated
    New(Variable),
    /// The name already existed
    Existing(Variable),
}

impl Declared {
    /// The variable, whichever way it was obtained
    pub fn variable(&self) -> Variable {
        match *self {
            Declared::New(var) | Declared::Existing(var) => var,
        }
    }

    /// True if the variable was allocated by this call
    pub fn is_new(&self) -> bool {
        matches!(self, Declared::New(_))
    }
}

/// A declared function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// `INTEGER` for `name`, `ADDRESS` for `&name`
    pub ty: ValueType,
}

/// Variables of one scope and the next free slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    variables: HashMap<String, Variable>,
    next_slot: i64,
}

impl SymbolTable {
    /// Creates an empty table whose first slot is 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a name up without declaring it
    pub fn resolve(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Returns the existing variable or allocates the next slot for it
    ///
    /// A freshly allocated variable is typed `INTEGER` until the caller
    /// fixes its type with [`SymbolTable::set_type`].
    pub fn resolve_or_declare(&mut self, name: &str) -> Declared {
        if let Some(var) = self.variables.get(name) {
            return Declared::Existing(*var);
        }
        let var = Variable {
            address: self.next_slot,
            ty: ValueType::Integer,
            storage: Storage::Scalar,
        };
        self.next_slot += 1;
        self.variables.insert(name.to_string(), var);
        Declared::New(var)
    }

    /// Turns a freshly declared scalar into an `ADDRESS`-typed array base of `len` cells
    ///
    /// The base cell is the first element, so `len - 1` further slots are reserved.
    pub fn declare_array(&mut self, name: &str, len: usize) -> Option<Variable> {
        let var = self.variables.get_mut(name)?;
        var.ty = ValueType::Address;
        var.storage = Storage::Array(len);
        self.next_slot += len as i64 - 1;
        Some(*var)
    }

    /// Fixes the type of an existing variable
    pub fn set_type(&mut self, name: &str, ty: ValueType) {
        if let Some(var) = self.variables.get_mut(name) {
            var.ty = ty;
        }
    }

    /// Binds a name to a fixed address without consuming a slot
    pub fn bind(&mut self, name: &str, var: Variable) {
        self.variables.insert(name.to_string(), var);
    }

    /// Number of slots allocated so far
    pub fn slot_count(&self) -> usize {
        self.next_slot.max(0) as usize
    }

    /// Number of named entries
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when no name is declared
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// The global scope plus, while a function body is translated, its local scope
#[derive(Debug, Default)]
pub struct ScopeStack {
    global: SymbolTable,
    function: Option<SymbolTable>,
}

impl ScopeStack {
    /// Starts in the global scope
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a function body is being translated
    pub fn in_function(&self) -> bool {
        self.function.is_some()
    }

    /// Addressing mode of the active scope
    pub fn mode(&self) -> AddressingMode {
        if self.in_function() {
            AddressingMode::FrameRelative
        } else {
            AddressingMode::Absolute
        }
    }

    /// The active symbol table
    pub fn active(&self) -> &SymbolTable {
        self.function.as_ref().unwrap_or(&self.global)
    }

    /// The active symbol table, mutably
    pub fn active_mut(&mut self) -> &mut SymbolTable {
        match self.function.as_mut() {
            Some(table) => table,
            None => &mut self.global,
        }
    }

    /// The global table, regardless of the active scope
    pub fn global(&self) -> &SymbolTable {
        &self.global
    }

    /// Makes a fresh local table active; the global table is left untouched
    pub fn enter_function(&mut self) -> &mut SymbolTable {
        self.function.insert(SymbolTable::new())
    }

    /// Leaves the function scope, handing back its finished table
    pub fn exit_function(&mut self) -> Option<SymbolTable> {
        self.function.take()
    }
}

/// Everything a call site needs to know about a translated function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Address of the function's first instruction
    pub entry_address: usize,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Frame slots beyond the parameters (locals and array cells)
    pub local_slot_count: usize,
    /// The function's finished symbol table
    pub locals: SymbolTable,
}

/// Returned when a function name is registered twice
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("function '{0}' is already declared")]
pub struct AlreadyDeclared(pub String);

/// Global registry of translated functions
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionInfo>,
}

impl FunctionTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function; an existing entry is never overwritten
    pub fn declare(&mut self, name: &str, info: FunctionInfo) -> Result<(), AlreadyDeclared> {
        if self.functions.contains_key(name) {
            return Err(AlreadyDeclared(name.to_string()));
        }
        self.functions.insert(name.to_string(), info);
        Ok(())
    }

    /// Looks a function up by name
    pub fn lookup(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    /// True if `name` was declared
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of declared functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when no function is declared
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
