use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::codec::{AccountSchema, FieldValues, LayoutError};

/// Assemble an instruction from its parts
///
/// The payload is `[discriminant] ++ operands`. Meta order is preserved
/// exactly as given.
pub fn build(
    program_id: Pubkey,
    metas: Vec<AccountMeta>,
    discriminant: u8,
    operands: &[u8],
) -> Instruction {
    let mut data = Vec::with_capacity(1 + operands.len());
    data.push(discriminant);
    data.extend_from_slice(operands);
    Instruction {
        program_id,
        accounts: metas,
        data,
    }
}

/// Fluent instruction builder
///
/// ```
/// # use solana_sdk::pubkey::Pubkey;
/// # use txkit::instruction::InstructionBuilder;
/// let program = Pubkey::new_unique();
/// let payer = Pubkey::new_unique();
/// let counter = Pubkey::new_unique();
///
/// let ix = InstructionBuilder::new(program)
///     .writable(counter)
///     .signer(payer)
///     .discriminant(0)
///     .build();
/// assert_eq!(ix.data, vec![0]);
/// assert!(ix.accounts[0].is_writable);
/// ```
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    program_id: Pubkey,
    accounts: Vec<AccountMeta>,
    discriminant: Option<u8>,
    operands: Vec<u8>,
}

impl InstructionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            accounts: Vec::new(),
            discriminant: None,
            operands: Vec::new(),
        }
    }

    /// Read-only signer
    pub fn signer(self, address: Pubkey) -> Self {
        self.meta(AccountMeta::new_readonly(address, true))
    }

    pub fn writable_signer(self, address: Pubkey) -> Self {
        self.meta(AccountMeta::new(address, true))
    }

    pub fn writable(self, address: Pubkey) -> Self {
        self.meta(AccountMeta::new(address, false))
    }

    pub fn readonly(self, address: Pubkey) -> Self {
        self.meta(AccountMeta::new_readonly(address, false))
    }

    pub fn meta(mut self, meta: AccountMeta) -> Self {
        self.accounts.push(meta);
        self
    }

    pub fn discriminant(mut self, discriminant: u8) -> Self {
        self.discriminant = Some(discriminant);
        self
    }

    /// Schema-encode the operands that follow the discriminant
    pub fn operands(mut self, schema: &AccountSchema, values: &FieldValues) -> Result<Self, LayoutError> {
        self.operands = schema.encode(values)?;
        Ok(self)
    }

    /// Use an already packed payload; with no discriminant it becomes the whole data
    pub fn operands_raw(mut self, payload: Vec<u8>) -> Self {
        self.operands = payload;
        self
    }

    pub fn build(self) -> Instruction {
        match self.discriminant {
            Some(discriminant) => build(self.program_id, self.accounts, discriminant, &self.operands),
            None => Instruction {
                program_id: self.program_id,
                accounts: self.accounts,
                data: self.operands,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FieldValue, AMOUNT_OPERANDS};

    #[test]
    fn test_build_keeps_meta_order_and_prefixes_discriminant() {
        let program = Pubkey::new_unique();
        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();

        let ix = build(
            program,
            vec![AccountMeta::new_readonly(first, true), AccountMeta::new(second, false)],
            7,
            &[1, 2, 3],
        );

        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data, vec![7, 1, 2, 3]);
        assert_eq!(ix.accounts[0].pubkey, first);
        assert!(ix.accounts[0].is_signer && !ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, second);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    #[test]
    fn test_builder_flags() {
        let keys: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let ix = InstructionBuilder::new(Pubkey::new_unique())
            .signer(keys[0])
            .writable_signer(keys[1])
            .writable(keys[2])
            .readonly(keys[3])
            .build();

        let flags: Vec<(bool, bool)> = ix.accounts.iter().map(|m| (m.is_signer, m.is_writable)).collect();
        assert_eq!(flags, vec![(true, false), (true, true), (false, true), (false, false)]);
        assert!(ix.data.is_empty());
    }

    #[test]
    fn test_builder_operands() {
        let values = FieldValues::new().with("amount", FieldValue::U64(500));
        let ix = InstructionBuilder::new(Pubkey::new_unique())
            .discriminant(1)
            .operands(&AMOUNT_OPERANDS, &values)
            .unwrap()
            .build();

        let mut expected = vec![1u8];
        expected.extend_from_slice(&500u64.to_le_bytes());
        assert_eq!(ix.data, expected);
    }
}
