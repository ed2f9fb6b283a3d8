use std::{
    collections::HashSet,
    fmt::Display,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on file({}): {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Invalid operand in instruction text: {0}")]
    InvalidOperand(String),
    #[error("Invalid instruction pointer({0}), expect in range([0, {1}])")]
    InvalidInstPtr(usize, usize),
    #[error("Invalid jump(from {0}, offset is {1})")]
    InvalidJmp(usize, isize),
    #[error("Accumulator overflow(at {0}, adding {1})")]
    AccOverflow(usize, isize),
    #[error("No single jmp/nop exchange makes the program run through to end")]
    NoRepairFound,
}

#[derive(Debug, Parser)]
pub struct CliArgs {
    pub input_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Acc(isize),
    Nop(isize),
    Jmp(isize),
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Acc(n) => write!(f, "acc {:+}", n),
            Instruction::Nop(n) => write!(f, "nop {:+}", n),
            Instruction::Jmp(n) => write!(f, "jmp {:+}", n),
        }
    }
}

impl Instruction {
    /// Decode one line of the listing.
    ///
    /// Lines that don't name a known mnemonic decode to `None` and are meant to
    /// be skipped by the caller. A known mnemonic followed by anything other
    /// than a single signed integer is an error.
    pub fn decode(text: &str) -> Result<Option<Self>, Error> {
        static PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)\s+(.*?)\s*$").unwrap());

        let Some(caps) = PATTERN.captures(text) else {
            return Ok(None);
        };
        let ctor: fn(isize) -> Self = match &caps[1] {
            "acc" => Self::Acc,
            "nop" => Self::Nop,
            "jmp" => Self::Jmp,
            _ => return Ok(None),
        };
        caps[2]
            .parse::<isize>()
            .map(|n| Some(ctor(n)))
            .map_err(|_| Error::InvalidOperand(text.to_string()))
    }

    pub fn is_mutable(&self) -> bool {
        !matches!(self, Instruction::Acc(_))
    }

    /// Exchange jmp and nop, keeping the operand. Acc is left as it is.
    pub fn toggled(self) -> Self {
        match self {
            Instruction::Jmp(n) => Instruction::Nop(n),
            Instruction::Nop(n) => Instruction::Jmp(n),
            acc => acc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<Instruction>,
}

impl FromIterator<Instruction> for Program {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Self {
            code: iter.into_iter().collect(),
        }
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Program::from_lines(s.lines().map(|l| Ok(l.to_string())))
    }
}

impl Program {
    fn from_lines<I>(lines: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Result<String, Error>>,
    {
        let mut code = Vec::new();
        for (ind, line) in lines.into_iter().enumerate() {
            let line = line?;
            match Instruction::decode(&line)? {
                Some(inst) => code.push(inst),
                None => debug!("Skipped line {}({:?}), no known instruction.", ind + 1, line),
            }
        }

        Ok(Self { code })
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn get(&self, ind: usize) -> Option<Instruction> {
        self.code.get(ind).copied()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.code
    }

    /// Index of the first jmp or nop at or after `from`, or the program length
    /// if there's none left.
    pub fn next_mutation_candidate(&self, from: usize) -> usize {
        self.code
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, inst)| inst.is_mutable())
            .map_or(self.code.len(), |(ind, _)| ind)
    }

    /// Copy of this program with the instruction at `ind` toggled.
    pub fn mutated(&self, ind: usize) -> Option<Program> {
        let inst = self.get(ind)?;
        let mut code = self.code.clone();
        code[ind] = inst.toggled();
        Some(Program { code })
    }
}

pub fn read_program<P: AsRef<Path>>(path: P) -> Result<Program, Error> {
    let path = path.as_ref();
    let io_err = |source: io::Error| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let reader = BufReader::new(file);
    Program::from_lines(reader.lines().map(|l| l.map_err(io_err)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Instruction pointer reached the end of program.
    Normal,
    /// Next instruction has been executed before.
    Loop,
}

#[derive(Debug, Clone, Default)]
pub struct GCState {
    pub inst_ptr: usize,
    pub acc: isize,
    visited: HashSet<usize>,
}

impl GCState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self, ind: usize) -> bool {
        self.visited.contains(&ind)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[derive(Debug, Default)]
pub struct GameConsole;
impl GameConsole {
    pub fn new() -> Self {
        Self
    }

    /// Execute `code` on `state` as long as `cond` holds before each step.
    pub fn run_while(
        &mut self,
        code: &[Instruction],
        state: &mut GCState,
        cond: &mut dyn FnMut(&GCState) -> bool,
    ) -> Result<(), Error> {
        while cond(state) {
            let inst = code
                .get(state.inst_ptr)
                .ok_or(Error::InvalidInstPtr(state.inst_ptr, code.len()))?;
            state.visited.insert(state.inst_ptr);
            match inst {
                Instruction::Acc(n) => {
                    state.acc = state
                        .acc
                        .checked_add(*n)
                        .ok_or(Error::AccOverflow(state.inst_ptr, *n))?;
                    state.inst_ptr += 1;
                }
                Instruction::Nop(_) => state.inst_ptr += 1,
                Instruction::Jmp(offset) => {
                    state.inst_ptr = state
                        .inst_ptr
                        .checked_add_signed(*offset)
                        .ok_or(Error::InvalidJmp(state.inst_ptr, *offset))?
                }
            }
        }

        Ok(())
    }

    /// Run until the program reaches its end or is about to repeat an instruction.
    pub fn run(&mut self, program: &Program, state: &mut GCState) -> Result<Halt, Error> {
        let end = program.len();
        self.run_while(program.as_slice(), state, &mut |s: &GCState| {
            s.inst_ptr != end && !s.visited(s.inst_ptr)
        })?;

        Ok(if state.inst_ptr == end {
            Halt::Normal
        } else {
            Halt::Loop
        })
    }
}

/// Run `program` from a fresh state, returns the final accumulator and whether
/// the program terminated normally.
///
/// A faulting program (jump out of range, accumulator overflow) counts as not
/// terminated, with the accumulator it had when the fault happened.
pub fn execute(program: &Program) -> (isize, bool) {
    let mut state = GCState::new();
    let normal = match GameConsole::new().run(program, &mut state) {
        Ok(halt) => halt == Halt::Normal,
        Err(e) => {
            debug!("Program stopped at {} by error({}).", state.inst_ptr, e);
            false
        }
    };

    (state.acc, normal)
}

#[derive(Debug, Clone)]
pub struct Repair {
    /// Index of the toggled instruction.
    pub index: usize,
    pub program: Program,
    /// Accumulator after the repaired program terminates.
    pub acc: isize,
}

/// Find the first jmp/nop (in ascending index order) whose exchange makes
/// `program` terminate normally.
pub fn repair_search(program: &Program) -> Result<Repair, Error> {
    let mut from = 0;
    loop {
        let index = program.next_mutation_candidate(from);
        let Some(mutated) = program.mutated(index) else {
            return Err(Error::NoRepairFound);
        };
        let (acc, normal) = execute(&mutated);
        if normal {
            info!(
                "Exchanged {}(at {}) to {}, program runs through to end.",
                program.code[index], index, mutated.code[index]
            );
            return Ok(Repair {
                index,
                program: mutated,
                acc,
            });
        }

        debug!(
            "Exchanged {}(at {}), program still loops(accumulator {}).",
            program.code[index], index, acc
        );
        from = index + 1;
    }
}
