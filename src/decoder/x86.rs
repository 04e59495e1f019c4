//! x86 decoder backed by iced-x86

use iced_x86::{
    Decoder, DecoderError, DecoderOptions, Formatter, Instruction, IntelFormatter, Mnemonic, OpKind, Register,
};
use log::{log_enabled, Level};

use super::{DecodeFailure, InstructionDecoder};
use crate::config::ClassifierProfile;
use crate::errors::{CategorizerError, CategorizerResult};
use crate::models::{DecodedInstruction, OperationKind, Operand};

/// Decoder for 16/32/64-bit x86 code
#[derive(Debug, Clone)]
pub struct X86Decoder {
    bitness: u32,
    displacement_threshold: u64,
}

impl X86Decoder {
    /// Create a decoder for `bitness`-bit code. Indirect branches through an
    /// absolute address at or above `displacement_threshold` are flagged.
    pub fn new(bitness: u32, displacement_threshold: u64) -> CategorizerResult<Self> {
        if !matches!(bitness, 16 | 32 | 64) {
            return Err(CategorizerError::Config(format!("unsupported x86 bitness {}", bitness)));
        }
        Ok(Self {
            bitness,
            displacement_threshold,
        })
    }

    /// Create a decoder matching a classifier profile
    pub fn from_profile(profile: &ClassifierProfile) -> CategorizerResult<Self> {
        Self::new(profile.bitness, profile.displacement_threshold)
    }

    fn displacement(&self, instr: &Instruction) -> i64 {
        // iced resolves rip/eip-relative operands to the target; recover the encoded value
        if instr.is_ip_rel_memory_operand() {
            return instr.memory_displacement64().wrapping_sub(instr.next_ip()) as i64;
        }
        match self.bitness {
            64 => instr.memory_displacement64() as i64,
            16 => instr.memory_displacement32() as u16 as i16 as i64,
            _ => instr.memory_displacement32() as i32 as i64,
        }
    }

    fn operands(&self, instr: &Instruction) -> Vec<Operand> {
        (0..instr.op_count())
            .map(|i| match instr.op_kind(i) {
                OpKind::Register => Operand::Register,
                OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => Operand::NearBranch {
                    target: instr.near_branch_target(),
                },
                OpKind::FarBranch16 | OpKind::FarBranch32 => Operand::FarBranch,
                OpKind::Memory => Operand::Memory {
                    displacement: self.displacement(instr),
                    absolute: instr.memory_base() == Register::None && instr.memory_index() == Register::None,
                },
                OpKind::Immediate8
                | OpKind::Immediate8_2nd
                | OpKind::Immediate16
                | OpKind::Immediate32
                | OpKind::Immediate64
                | OpKind::Immediate8to16
                | OpKind::Immediate8to32
                | OpKind::Immediate8to64
                | OpKind::Immediate32to64 => Operand::Immediate,
                // Implicit string operands: segment plus si/di, no displacement
                _ => Operand::Memory {
                    displacement: 0,
                    absolute: false,
                },
            })
            .collect()
    }

    /// Far branches never appear in flat-model JIT code, and an indirect branch
    /// through a huge absolute address reads a pointer from nowhere.
    fn has_bad_branch_target(&self, instr: &Instruction, operands: &[Operand]) -> bool {
        if instr.is_jmp_far() || instr.is_call_far() || instr.is_jmp_far_indirect() || instr.is_call_far_indirect() {
            return true;
        }
        if instr.is_jmp_near_indirect() || instr.is_call_near_indirect() {
            return operands.iter().any(|op| match op {
                Operand::Memory { displacement, absolute: true } => {
                    displacement.unsigned_abs() >= self.displacement_threshold
                }
                _ => false,
            });
        }
        false
    }
}

impl InstructionDecoder for X86Decoder {
    fn decode_next(&self, bytes: &[u8], offset: usize, address: u64) -> Result<DecodedInstruction, DecodeFailure> {
        let window = bytes.get(offset..).filter(|w| !w.is_empty()).ok_or(DecodeFailure::Exhausted)?;

        let mut decoder = Decoder::try_with_ip(self.bitness, window, address, DecoderOptions::NONE)
            .map_err(|_| DecodeFailure::Invalid)?;
        let instr = decoder.decode();
        if instr.is_invalid() {
            return Err(match decoder.last_error() {
                DecoderError::NoMoreBytes => DecodeFailure::Exhausted,
                _ => DecodeFailure::Invalid,
            });
        }

        let operands = self.operands(&instr);
        let kind = operation_kind(&instr);
        let mnemonic = format!("{:?}", instr.mnemonic()).to_lowercase();
        let text = if log_enabled!(Level::Trace) {
            let mut output = String::new();
            IntelFormatter::new().format(&instr, &mut output);
            output
        } else {
            mnemonic.clone()
        };

        Ok(DecodedInstruction {
            address,
            bytes: window[..instr.len()].to_vec(),
            kind,
            mnemonic,
            text,
            bad_branch_target: self.has_bad_branch_target(&instr, &operands),
            operands,
        })
    }
}

/// Map an exact mnemonic onto its coarse operation class
fn operation_kind(instr: &Instruction) -> OperationKind {
    use OperationKind as K;

    // cmpsd/movsd are also SSE mnemonics; those take register operands
    let is_string_form = instr.op_count() == 0 || instr.op_kind(0) != OpKind::Register;

    match instr.mnemonic() {
        Mnemonic::Add | Mnemonic::Adc => K::Add,
        Mnemonic::Sub | Mnemonic::Sbb => K::Sub,
        Mnemonic::Mul | Mnemonic::Imul => K::Mul,
        Mnemonic::Div | Mnemonic::Idiv => K::Div,
        Mnemonic::Cmp => K::Cmp,
        Mnemonic::Test => K::Test,
        Mnemonic::Mov | Mnemonic::Movzx | Mnemonic::Movsx | Mnemonic::Movsxd => K::Mov,
        Mnemonic::Xchg => K::Xchg,
        Mnemonic::Lea => K::Lea,
        Mnemonic::Push => K::Push,
        Mnemonic::Pop => K::Pop,
        Mnemonic::Pusha | Mnemonic::Pushad | Mnemonic::Popa | Mnemonic::Popad => K::PushRegs,
        Mnemonic::And => K::And,
        Mnemonic::Or => K::Or,
        Mnemonic::Xor => K::Xor,
        Mnemonic::Not => K::Not,
        Mnemonic::Neg => K::Neg,
        Mnemonic::Shl | Mnemonic::Shr | Mnemonic::Sar | Mnemonic::Sal => K::Shift,
        Mnemonic::Rol | Mnemonic::Rcl => K::RotateLeft,
        Mnemonic::Ror | Mnemonic::Rcr => K::RotateRight,
        Mnemonic::Inc => K::Inc,
        Mnemonic::Dec => K::Dec,
        Mnemonic::Jmp => K::Jmp,
        Mnemonic::Jo
        | Mnemonic::Jno
        | Mnemonic::Jb
        | Mnemonic::Jae
        | Mnemonic::Je
        | Mnemonic::Jne
        | Mnemonic::Jbe
        | Mnemonic::Ja
        | Mnemonic::Js
        | Mnemonic::Jns
        | Mnemonic::Jp
        | Mnemonic::Jnp
        | Mnemonic::Jl
        | Mnemonic::Jge
        | Mnemonic::Jle
        | Mnemonic::Jg
        | Mnemonic::Jcxz
        | Mnemonic::Jecxz
        | Mnemonic::Jrcxz
        | Mnemonic::Loop
        | Mnemonic::Loope
        | Mnemonic::Loopne => K::ConditionalJump,
        Mnemonic::Call => K::Call,
        Mnemonic::Ret | Mnemonic::Retf | Mnemonic::Iret | Mnemonic::Iretd | Mnemonic::Iretq => K::Return,
        Mnemonic::Cli | Mnemonic::Sti => K::InterruptFlag,
        Mnemonic::Cmpsb
        | Mnemonic::Cmpsw
        | Mnemonic::Cmpsq
        | Mnemonic::Scasb
        | Mnemonic::Scasw
        | Mnemonic::Scasd
        | Mnemonic::Scasq => K::StringCompare,
        Mnemonic::Cmpsd if is_string_form => K::StringCompare,
        Mnemonic::Lodsb | Mnemonic::Lodsw | Mnemonic::Lodsd | Mnemonic::Lodsq => K::StringLoad,
        Mnemonic::Movsb
        | Mnemonic::Movsw
        | Mnemonic::Movsq
        | Mnemonic::Stosb
        | Mnemonic::Stosw
        | Mnemonic::Stosd
        | Mnemonic::Stosq => K::StringStore,
        Mnemonic::Movsd if is_string_form => K::StringStore,
        Mnemonic::Cmc => K::ToggleCarry,
        Mnemonic::Stc => K::SetCarry,
        Mnemonic::Clc => K::ClearCarry,
        Mnemonic::In | Mnemonic::Insb | Mnemonic::Insw | Mnemonic::Insd => K::PortIn,
        Mnemonic::Out | Mnemonic::Outsb | Mnemonic::Outsw | Mnemonic::Outsd => K::PortOut,
        Mnemonic::Xlatb => K::Translate,
        Mnemonic::Into | Mnemonic::Bound => K::OverflowTrap,
        Mnemonic::Aaa | Mnemonic::Aas | Mnemonic::Aam | Mnemonic::Aad | Mnemonic::Daa | Mnemonic::Das => K::BcdAdjust,
        Mnemonic::Int | Mnemonic::Int3 | Mnemonic::Int1 => K::Interrupt,
        Mnemonic::Hlt => K::Halt,
        Mnemonic::Nop => K::Nop,
        _ => K::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<DecodedInstruction, DecodeFailure> {
        X86Decoder::new(32, 0x1000_0000).unwrap().decode_next(bytes, 0, 0x1000)
    }

    #[test]
    fn test_zero_bytes_decode_as_two_byte_add() {
        let instr = decode(&[0x00, 0x00]).unwrap();
        assert_eq!(instr.len(), 2);
        assert_eq!(instr.kind, OperationKind::Add);
        assert_eq!(instr.mnemonic, "add");
        assert!(instr.is_zero_fill());
    }

    #[test]
    fn test_operation_kinds() {
        assert_eq!(decode(&[0x40]).unwrap().kind, OperationKind::Inc); // inc eax
        assert_eq!(decode(&[0xfa]).unwrap().kind, OperationKind::InterruptFlag); // cli
        assert_eq!(decode(&[0xac]).unwrap().kind, OperationKind::StringLoad); // lodsb
        assert_eq!(decode(&[0xa6]).unwrap().kind, OperationKind::StringCompare); // cmpsb
        assert_eq!(decode(&[0xd7]).unwrap().kind, OperationKind::Translate); // xlatb
        assert_eq!(decode(&[0x37]).unwrap().kind, OperationKind::BcdAdjust); // aaa
        assert_eq!(decode(&[0xf5]).unwrap().kind, OperationKind::ToggleCarry); // cmc
        assert_eq!(decode(&[0xe4, 0x10]).unwrap().kind, OperationKind::PortIn); // in al, 0x10
        assert_eq!(decode(&[0xd1, 0xc0]).unwrap().kind, OperationKind::RotateLeft); // rol eax, 1
        assert_eq!(decode(&[0x55]).unwrap().kind, OperationKind::Push);
        assert_eq!(decode(&[0xc3]).unwrap().kind, OperationKind::Return);
        assert_eq!(decode(&[0x89, 0xe5]).unwrap().kind, OperationKind::Mov); // mov ebp, esp
    }

    #[test]
    fn test_rare_variants_keep_their_mnemonic() {
        let adc = decode(&[0x11, 0xc0]).unwrap(); // adc eax, eax
        assert_eq!(adc.kind, OperationKind::Add);
        assert_eq!(adc.mnemonic, "adc");

        let pushad = decode(&[0x60]).unwrap();
        assert_eq!(pushad.kind, OperationKind::PushRegs);
        assert!(pushad.mnemonic.starts_with("pusha"));

        let retf = decode(&[0xcb]).unwrap();
        assert_eq!(retf.kind, OperationKind::Return);
        assert_eq!(retf.mnemonic, "retf");

        let loopne = decode(&[0xe0, 0x00]).unwrap();
        assert_eq!(loopne.kind, OperationKind::ConditionalJump);
        assert_eq!(loopne.mnemonic, "loopne");
    }

    #[test]
    fn test_memory_displacement_is_signed() {
        // mov eax, [ebp-8]
        let instr = decode(&[0x8b, 0x45, 0xf8]).unwrap();
        assert_eq!(instr.operands, vec![Operand::Register, Operand::Memory { displacement: -8, absolute: false }]);

        // mov eax, [0x20000000]
        let instr = decode(&[0xa1, 0x00, 0x00, 0x00, 0x20]).unwrap();
        assert_eq!(instr.operands[1], Operand::Memory { displacement: 0x2000_0000, absolute: true });
    }

    #[test]
    fn test_near_branch_operand() {
        // jmp short +2, decoded at 0x1000
        let instr = decode(&[0xeb, 0x02]).unwrap();
        assert_eq!(instr.kind, OperationKind::Jmp);
        assert_eq!(instr.operands, vec![Operand::NearBranch { target: 0x1004 }]);
        assert!(!instr.bad_branch_target);
    }

    #[test]
    fn test_suspicious_branch_targets() {
        // jmp far 0x0010:0x00401000
        let far = decode(&[0xea, 0x00, 0x10, 0x40, 0x00, 0x10, 0x00]).unwrap();
        assert!(far.bad_branch_target);

        // jmp dword ptr [0x7fff0000]
        let indirect = decode(&[0xff, 0x25, 0x00, 0x00, 0xff, 0x7f]).unwrap();
        assert!(indirect.bad_branch_target);

        // jmp dword ptr [eax+4]
        let register_based = decode(&[0xff, 0x60, 0x04]).unwrap();
        assert!(!register_based.bad_branch_target);
    }

    #[test]
    fn test_failures() {
        assert_eq!(decode(&[]), Err(DecodeFailure::Exhausted));
        // mov eax, imm32 cut short
        assert_eq!(decode(&[0xb8, 0x01]), Err(DecodeFailure::Exhausted));
        // lea with a register source
        assert_eq!(decode(&[0x8d, 0xc0]), Err(DecodeFailure::Invalid));
    }

    #[test]
    fn test_decode_respects_offset() {
        let decoder = X86Decoder::new(32, 0x1000_0000).unwrap();
        let bytes = [0x90, 0x55, 0xc3];
        let instr = decoder.decode_next(&bytes, 1, 0x2001).unwrap();
        assert_eq!(instr.address, 0x2001);
        assert_eq!(instr.bytes, vec![0x55]);
        assert_eq!(decoder.decode_next(&bytes, 3, 0x2003), Err(DecodeFailure::Exhausted));
    }

    #[test]
    fn test_rip_relative_displacement_is_encoded_value() {
        let decoder = X86Decoder::new(64, 0x1000_0000).unwrap();

        // mov rax, [rip+0x10]
        let instr = decoder.decode_next(&[0x48, 0x8b, 0x05, 0x10, 0x00, 0x00, 0x00], 0, 0x7ff6_0000_1000).unwrap();
        assert_eq!(instr.operands, vec![Operand::Register, Operand::Memory { displacement: 0x10, absolute: false }]);

        // mov rax, [rip-0x20]
        let instr = decoder.decode_next(&[0x48, 0x8b, 0x05, 0xe0, 0xff, 0xff, 0xff], 0, 0x7ff6_0000_1000).unwrap();
        assert_eq!(instr.operands[1], Operand::Memory { displacement: -0x20, absolute: false });

        // mov rax, [rbx-8] keeps its sign in 64-bit mode
        let instr = decoder.decode_next(&[0x48, 0x8b, 0x43, 0xf8], 0, 0x7ff6_0000_1000).unwrap();
        assert_eq!(instr.operands[1], Operand::Memory { displacement: -8, absolute: false });
    }

    #[test]
    fn test_invalid_bitness() {
        assert!(X86Decoder::new(8, 0).is_err());
    }
}
