use std::fmt;
use std::io::{self, Stdout, Write};

use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unrecognized instruction: {0:#010b}")]
    InvalidOpcode(u8),
    #[error("Unsupported ALU operation: {0:#010b}")]
    UnsupportedAluOp(u8),
    #[error("Invalid register: r{0}")]
    InvalidRegister(u8),
    #[error("Program of {0} bytes does not fit in memory")]
    ProgramTooLarge(usize),
    #[error("Failed to write output")]
    Output(#[from] io::Error),
}

pub const MEMORY_SIZE: usize = 256;
pub const NUM_REGISTERS: usize = 8;
/// Register 7 doubles as the stack pointer.
pub const SP: u8 = 7;
pub const SP_INIT: u8 = 0xF4;

pub const FL_EQ: u8 = 0b001;
pub const FL_GT: u8 = 0b010;
pub const FL_LT: u8 = 0b100;

/// The three bytes read on every fetch. Opcodes that take fewer operands
/// ignore the rest.
#[derive(Clone, Copy, Debug)]
struct Fetch {
    opcode: u8,
    a: u8,
    b: u8,
}

pub struct Vm<W: Write = Stdout> {
    registers: [u8; NUM_REGISTERS],
    memory: [u8; MEMORY_SIZE],
    pc: u8,
    flags: u8,
    halted: bool,
    trace: bool,
    output: W,
}

impl Vm<Stdout> {
    pub fn new() -> Vm<Stdout> {
        Vm::with_output(io::stdout())
    }
}

impl Default for Vm<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    pub fn with_output(output: W) -> Vm<W> {
        let mut registers = [0; NUM_REGISTERS];
        registers[SP as usize] = SP_INIT;
        Vm {
            registers,
            memory: [0; MEMORY_SIZE],
            pc: 0,
            flags: 0,
            halted: false,
            trace: false,
            output,
        }
    }

    /// Log a state trace line before every fetch.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn pc(&self) -> u8 {
        self.pc
    }
    pub fn flags(&self) -> u8 {
        self.flags
    }
    pub fn is_halted(&self) -> bool {
        self.halted
    }
    pub fn registers(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }
    pub fn output(&self) -> &W {
        &self.output
    }
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn ram_read(&self, address: u8) -> u8 {
        self.memory[address as usize]
    }
    pub fn ram_write(&mut self, address: u8, value: u8) {
        self.memory[address as usize] = value;
    }

    pub fn register(&self, index: u8) -> Result<u8, Error> {
        self.registers
            .get(index as usize)
            .copied()
            .ok_or(Error::InvalidRegister(index))
    }
    fn set_reg(&mut self, index: u8, value: u8) -> Result<(), Error> {
        let slot = self
            .registers
            .get_mut(index as usize)
            .ok_or(Error::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    /// Copies `program` into memory starting at address 0.
    pub fn load(&mut self, program: &[u8]) -> Result<(), Error> {
        if program.len() > MEMORY_SIZE {
            return Err(Error::ProgramTooLarge(program.len()));
        }
        for (address, &byte) in program.iter().enumerate() {
            self.ram_write(address as u8, byte);
        }
        debug!("loaded {} bytes", program.len());
        Ok(())
    }

    pub fn alu(&mut self, op: u8, reg_a: u8, reg_b: u8) -> Result<(), Error> {
        match op {
            ADD => {
                let value = self.register(reg_a)?.wrapping_add(self.register(reg_b)?);
                self.set_reg(reg_a, value)?;
                trace!("add r{} <- {:x}", reg_a, value);
            }
            _ => return Err(Error::UnsupportedAluOp(op)),
        }
        Ok(())
    }

    pub fn trace(&self) -> Trace<'_, W> {
        Trace(self)
    }

    fn fetch(&self) -> Fetch {
        Fetch {
            opcode: self.ram_read(self.pc),
            a: self.ram_read(self.pc.wrapping_add(1)),
            b: self.ram_read(self.pc.wrapping_add(2)),
        }
    }

    pub fn run(&mut self) -> Result<(), Error> {
        while !self.halted {
            self.step()?;
        }
        Ok(())
    }

    /// Executes a single instruction. Does nothing once halted.
    pub fn step(&mut self) -> Result<(), Error> {
        if self.halted {
            return Ok(());
        }
        if self.trace {
            debug!("{}", self.trace());
        }

        let Fetch { opcode, a, b } = self.fetch();
        match opcode {
            HLT => {
                self.halted = true;
                self.pc = self.pc.wrapping_add(1);

                trace!("hlt");
            }
            LDI => {
                self.set_reg(a, b)?;
                self.pc = self.pc.wrapping_add(3);

                trace!("ldi r{} <- {:x}", a, b);
            }
            PRN => {
                let value = self.register(a)?;
                writeln!(self.output, "{}", value)?;
                self.pc = self.pc.wrapping_add(2);

                trace!("prn r{} = {}", a, value);
            }
            MUL => {
                let value = self.register(a)?.wrapping_mul(self.register(b)?);
                self.set_reg(a, value)?;
                self.pc = self.pc.wrapping_add(3);

                trace!("mul r{} <- {:x}", a, value);
            }
            PUSH => {
                let sp = self.register(SP)?.wrapping_sub(1);
                // PUSH SP stores the decremented pointer.
                let value = if a == SP { sp } else { self.register(a)? };
                self.set_reg(SP, sp)?;
                self.ram_write(sp, value);
                self.pc = self.pc.wrapping_add(2);

                trace!("push [{:x}] <- r{} = {:x}", sp, a, value);
            }
            POP => {
                let sp = self.register(SP)?;
                let value = self.ram_read(sp);
                self.set_reg(a, value)?;
                self.set_reg(SP, self.register(SP)?.wrapping_add(1))?;
                self.pc = self.pc.wrapping_add(2);

                trace!("pop r{} <- [{:x}] = {:x}", a, sp, value);
            }
            CMP => {
                let (lhs, rhs) = (self.register(a)?, self.register(b)?);
                self.flags = match lhs.cmp(&rhs) {
                    std::cmp::Ordering::Equal => FL_EQ,
                    std::cmp::Ordering::Greater => FL_GT,
                    std::cmp::Ordering::Less => FL_LT,
                };
                self.pc = self.pc.wrapping_add(3);

                trace!("cmp r{} r{} -> fl {:03b}", a, b, self.flags);
            }
            JMP => {
                self.pc = self.register(a)?;

                trace!("jmp pc <- {:x}", self.pc);
            }
            JEQ => {
                let target = self.register(a)?;
                self.jump_if(self.flags & FL_EQ != 0, target);

                trace!("jeq pc <- {:x}", self.pc);
            }
            JNE => {
                let target = self.register(a)?;
                self.jump_if(self.flags & FL_EQ == 0, target);

                trace!("jne pc <- {:x}", self.pc);
            }
            _ => return Err(Error::InvalidOpcode(opcode)),
        }

        Ok(())
    }

    fn jump_if(&mut self, condition: bool, target: u8) {
        self.pc = if condition {
            target
        } else {
            self.pc.wrapping_add(2)
        };
    }
}

/// `TRACE: PC | B0 B1 B2 | R0 .. R7`, every field as two hex digits.
pub struct Trace<'a, W: Write>(&'a Vm<W>);

impl<W: Write> fmt::Display for Trace<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vm = self.0;
        let Fetch { opcode, a, b } = vm.fetch();
        write!(f, "TRACE: {:02X} | {:02X} {:02X} {:02X} |", vm.pc, opcode, a, b)?;
        for value in vm.registers {
            write!(f, " {:02X}", value)?;
        }
        Ok(())
    }
}

pub const HLT: u8 = 0b0000_0001;
pub const LDI: u8 = 0b1000_0010;
pub const PRN: u8 = 0b0100_0111;
pub const MUL: u8 = 0b1010_0010;
pub const PUSH: u8 = 0b0100_0101;
pub const POP: u8 = 0b0100_0110;
pub const CMP: u8 = 0b1010_0111;
pub const JMP: u8 = 0b0101_0100;
pub const JEQ: u8 = 0b0101_0101;
pub const JNE: u8 = 0b0101_0110;

// ALU operations
pub const ADD: u8 = 0b1010_0000;
