//! Payload enums for the programs this crate talks to
//!
//! Every payload is `[discriminant] ++ operands`, with operands encoded by
//! the schema codec.

use crate::codec::{FieldValue, FieldValues, LayoutError, AMOUNT_OPERANDS, CALCULATOR_OPERANDS};

fn split<'a>(schema: &'static str, data: &'a [u8]) -> Result<(u8, &'a [u8]), LayoutError> {
    data.split_first()
        .map(|(tag, rest)| (*tag, rest))
        .ok_or(LayoutError::EmptyPayload { schema })
}

fn with_tag(tag: u8, operands: Vec<u8>) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + operands.len());
    data.push(tag);
    data.extend(operands);
    data
}

/// Greeting counter program
///
/// The program ignores its payload and increments the counter on every
/// call; a single zero byte is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingInstruction {
    Greet,
}

impl GreetingInstruction {
    const SCHEMA: &'static str = "greeting_instruction";

    pub fn pack(&self) -> Vec<u8> {
        vec![0]
    }

    pub fn unpack(data: &[u8]) -> Result<Self, LayoutError> {
        match split(Self::SCHEMA, data)?.0 {
            0 => Ok(Self::Greet),
            discriminant => Err(LayoutError::UnknownDiscriminant {
                schema: Self::SCHEMA,
                discriminant,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorInstruction {
    Add { a: u64, b: u64 },
    Sub { a: u64, b: u64 },
}

impl CalculatorInstruction {
    const SCHEMA: &'static str = "calculator_instruction";

    pub fn discriminant(&self) -> u8 {
        match self {
            Self::Add { .. } => 0,
            Self::Sub { .. } => 1,
        }
    }

    pub fn operands(&self) -> (u64, u64) {
        match *self {
            Self::Add { a, b } | Self::Sub { a, b } => (a, b),
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>, LayoutError> {
        let (a, b) = self.operands();
        let values = FieldValues::new()
            .with("a", FieldValue::U64(a))
            .with("b", FieldValue::U64(b));
        Ok(with_tag(self.discriminant(), CALCULATOR_OPERANDS.encode(&values)?))
    }

    pub fn unpack(data: &[u8]) -> Result<Self, LayoutError> {
        let (tag, rest) = split(Self::SCHEMA, data)?;
        let values = CALCULATOR_OPERANDS.decode(rest)?;
        let a = values.u64(CALCULATOR_OPERANDS.name(), "a")?;
        let b = values.u64(CALCULATOR_OPERANDS.name(), "b")?;
        match tag {
            0 => Ok(Self::Add { a, b }),
            1 => Ok(Self::Sub { a, b }),
            discriminant => Err(LayoutError::UnknownDiscriminant {
                schema: Self::SCHEMA,
                discriminant,
            }),
        }
    }
}

/// Escrow program instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowInstruction {
    /// Lock the temp holder under the program; `amount` is what the
    /// initializer expects to receive
    InitEscrow { amount: u64 },
    /// `amount` is what the taker expects to receive from the temp holder
    Exchange { amount: u64 },
    /// Return the locked tokens to the initializer and close the escrow
    Cancel,
}

impl EscrowInstruction {
    const SCHEMA: &'static str = "escrow_instruction";

    pub fn discriminant(&self) -> u8 {
        match self {
            Self::InitEscrow { .. } => 0,
            Self::Exchange { .. } => 1,
            Self::Cancel => 2,
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>, LayoutError> {
        let operands = match *self {
            Self::InitEscrow { amount } | Self::Exchange { amount } => {
                AMOUNT_OPERANDS.encode(&FieldValues::new().with("amount", FieldValue::U64(amount)))?
            }
            Self::Cancel => Vec::new(),
        };
        Ok(with_tag(self.discriminant(), operands))
    }

    pub fn unpack(data: &[u8]) -> Result<Self, LayoutError> {
        let (tag, rest) = split(Self::SCHEMA, data)?;
        let amount = || -> Result<u64, LayoutError> {
            AMOUNT_OPERANDS
                .decode(rest)?
                .u64(AMOUNT_OPERANDS.name(), "amount")
        };
        match tag {
            0 => Ok(Self::InitEscrow { amount: amount()? }),
            1 => Ok(Self::Exchange { amount: amount()? }),
            2 => Ok(Self::Cancel),
            discriminant => Err(LayoutError::UnknownDiscriminant {
                schema: Self::SCHEMA,
                discriminant,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greet_payload() {
        assert_eq!(GreetingInstruction::Greet.pack(), vec![0]);
        assert_eq!(GreetingInstruction::unpack(&[0]).unwrap(), GreetingInstruction::Greet);
        assert!(matches!(
            GreetingInstruction::unpack(&[]),
            Err(LayoutError::EmptyPayload { .. })
        ));
    }

    #[test]
    fn test_calculator_payload_layout() {
        let data = CalculatorInstruction::Add { a: 5, b: 7 }.pack().unwrap();
        assert_eq!(data.len(), 17);
        assert_eq!(data[0], 0);
        assert_eq!(&data[1..9], &5u64.to_le_bytes());
        assert_eq!(&data[9..], &7u64.to_le_bytes());

        let sub = CalculatorInstruction::Sub { a: 9, b: 4 };
        assert_eq!(sub.pack().unwrap()[0], 1);
        assert_eq!(CalculatorInstruction::unpack(&sub.pack().unwrap()).unwrap(), sub);
    }

    #[test]
    fn test_calculator_rejects_short_operands() {
        let err = CalculatorInstruction::unpack(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, LayoutError::SizeMismatch { expected: 16, actual: 2, .. }));
    }

    #[test]
    fn test_escrow_payloads() {
        let init = EscrowInstruction::InitEscrow { amount: 1_000 }.pack().unwrap();
        assert_eq!(init[0], 0);
        assert_eq!(&init[1..], &1_000u64.to_le_bytes());

        let exchange = EscrowInstruction::Exchange { amount: 3 }.pack().unwrap();
        assert_eq!(exchange[0], 1);
        assert_eq!(EscrowInstruction::unpack(&exchange).unwrap(), EscrowInstruction::Exchange { amount: 3 });

        assert_eq!(EscrowInstruction::Cancel.pack().unwrap(), vec![2]);
        assert_eq!(EscrowInstruction::unpack(&[2]).unwrap(), EscrowInstruction::Cancel);

        assert!(matches!(
            EscrowInstruction::unpack(&[9]),
            Err(LayoutError::UnknownDiscriminant { discriminant: 9, .. })
        ));
    }
}
