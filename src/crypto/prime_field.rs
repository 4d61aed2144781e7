//! Prime field arithmetic over fixed-width `ruint` integers.
//!
//! Plain modular operations; sizes are chosen per use (576 bits covers
//! every standardized eMRTD curve up to P-521, 2048 bits the mod-p
//! groups).

use {
    anyhow::{ensure, Result},
    rand::{CryptoRng, Rng, RngCore},
};

/// Field element width used for elliptic curves.
pub type Uint = ruint::Uint<576, 9>;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct PrimeField<const BITS: usize, const LIMBS: usize> {
    modulus: ruint::Uint<BITS, LIMBS>,
}

impl<const BITS: usize, const LIMBS: usize> PrimeField<BITS, LIMBS> {
    pub fn new(modulus: ruint::Uint<BITS, LIMBS>) -> Self {
        assert_ne!(modulus, ruint::Uint::ZERO);
        Self { modulus }
    }

    pub fn modulus(&self) -> ruint::Uint<BITS, LIMBS> {
        self.modulus
    }

    /// Length of a field element octet string, TR-03111 section 3.1.2.
    pub fn byte_len(&self) -> usize {
        self.modulus.byte_len()
    }

    pub fn add(
        &self,
        a: ruint::Uint<BITS, LIMBS>,
        b: ruint::Uint<BITS, LIMBS>,
    ) -> ruint::Uint<BITS, LIMBS> {
        a.add_mod(b, self.modulus)
    }

    pub fn sub(
        &self,
        a: ruint::Uint<BITS, LIMBS>,
        b: ruint::Uint<BITS, LIMBS>,
    ) -> ruint::Uint<BITS, LIMBS> {
        a.add_mod(self.neg(b), self.modulus)
    }

    pub fn neg(&self, a: ruint::Uint<BITS, LIMBS>) -> ruint::Uint<BITS, LIMBS> {
        if a == ruint::Uint::ZERO {
            a
        } else {
            self.modulus - a
        }
    }

    pub fn mul(
        &self,
        a: ruint::Uint<BITS, LIMBS>,
        b: ruint::Uint<BITS, LIMBS>,
    ) -> ruint::Uint<BITS, LIMBS> {
        a.mul_mod(b, self.modulus)
    }

    pub fn pow(
        &self,
        base: ruint::Uint<BITS, LIMBS>,
        exp: ruint::Uint<BITS, LIMBS>,
    ) -> ruint::Uint<BITS, LIMBS> {
        base.pow_mod(exp, self.modulus)
    }

    /// Multiplicative inverse. `None` for zero or non-invertible elements.
    pub fn inv(&self, a: ruint::Uint<BITS, LIMBS>) -> Option<ruint::Uint<BITS, LIMBS>> {
        a.inv_mod(self.modulus)
    }

    /// Euler criterion. The modulus must be an odd prime.
    pub fn is_quadratic_residue(&self, a: ruint::Uint<BITS, LIMBS>) -> bool {
        if a == ruint::Uint::ZERO {
            return true;
        }
        let exp = (self.modulus - ruint::Uint::from(1)) >> 1;
        self.pow(a, exp) == ruint::Uint::from(1)
    }

    /// Square root for p ≡ 3 (mod 4) via the (p+1)/4 exponent.
    ///
    /// Every standardized eMRTD curve prime satisfies the congruence.
    pub fn sqrt(&self, a: ruint::Uint<BITS, LIMBS>) -> Option<ruint::Uint<BITS, LIMBS>> {
        assert_eq!(self.modulus.as_limbs()[0] & 3, 3, "modulus must be 3 mod 4");
        let exp = (self.modulus + ruint::Uint::from(1)) >> 2;
        let root = self.pow(a, exp);
        (self.mul(root, root) == a).then_some(root)
    }

    /// Uniform non-zero field element, TR-03111 section 4.1.1.
    pub fn random_nonzero(
        &self,
        mut rng: impl CryptoRng + RngCore,
    ) -> ruint::Uint<BITS, LIMBS> {
        loop {
            let mut value = rng.gen::<ruint::Uint<BITS, LIMBS>>();
            // Zero out the bits above the modulus to cut rejections.
            for b in self.modulus.bit_len()..BITS {
                value.set_bit(b, false);
            }
            if value != ruint::Uint::ZERO && value < self.modulus {
                return value;
            }
        }
    }

    /// TR-03111 section 3.1.3 OS2FE: big-endian bytes reduced mod p.
    pub fn os2fe(&self, os: &[u8]) -> ruint::Uint<BITS, LIMBS> {
        let mut result = ruint::Uint::ZERO;
        let base = ruint::Uint::from(256);
        for byte in os {
            result = self.mul(result, base);
            result = self.add(result, ruint::Uint::from(*byte));
        }
        result
    }

    /// TR-03111 section 3.1.3 FE2OS: fixed-length big-endian encoding.
    pub fn fe2os(&self, fe: ruint::Uint<BITS, LIMBS>) -> Vec<u8> {
        let bytes = fe.to_be_bytes_vec();
        let len = self.byte_len();
        assert!(bytes.len() >= len);
        bytes[bytes.len() - len..].to_vec()
    }
}

/// Parse an unsigned big-endian octet string, rejecting oversized input.
pub fn uint_from_be_slice<const BITS: usize, const LIMBS: usize>(
    bytes: &[u8],
) -> Result<ruint::Uint<BITS, LIMBS>> {
    // Tolerate a leading zero from DER two's-complement encoding.
    let bytes = match bytes {
        [0x00, rest @ ..] => rest,
        _ => bytes,
    };
    ensure!(
        bytes.len() * 8 <= BITS + 7,
        "integer too large for field width"
    );
    let mut zero_extended = vec![0u8; ruint::Uint::<BITS, LIMBS>::BYTES];
    let offset = zero_extended.len() - bytes.len();
    zero_extended[offset..].copy_from_slice(bytes);
    Ok(ruint::Uint::from_be_slice(&zero_extended))
}

/// Parse a DER `INTEGER` as an unsigned field-sized value.
pub fn uint_from_der_int<const BITS: usize, const LIMBS: usize>(
    int: &der::asn1::Int,
) -> Result<ruint::Uint<BITS, LIMBS>> {
    let big_endian = int.as_bytes();
    ensure!(!big_endian.is_empty(), "empty integer");
    ensure!(
        big_endian[0] & 0x80 == 0 || big_endian[0] == 0x00,
        "integer is negative"
    );
    uint_from_be_slice(big_endian)
}

#[cfg(test)]
mod tests {
    use super::*;

    type F = PrimeField<576, 9>;

    fn field() -> F {
        // brainpoolP256r1 prime.
        F::new(
            uint_from_be_slice(
                &hex_literal::hex!(
                    "A9FB57DBA1EEA9BC3E660A909D838D726E3BF623D52620282013481D1F6E5377"
                ),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_inverse() {
        let f = field();
        let a = Uint::from(12345u64);
        let inv = f.inv(a).unwrap();
        assert_eq!(f.mul(a, inv), Uint::from(1));
    }

    #[test]
    fn test_sqrt() {
        let f = field();
        let a = Uint::from(7u64);
        let sq = f.mul(a, a);
        let root = f.sqrt(sq).unwrap();
        assert!(root == a || root == f.neg(a));
        assert!(f.is_quadratic_residue(sq));
    }

    #[test]
    fn test_os2fe_round_trip() {
        let f = field();
        let bytes =
            hex_literal::hex!("8BD2AEB9CB7E57CB2C4B482FFC81B7AFB9DE27E1E3BD23C23A4453BD9ACE3262");
        let fe = f.os2fe(&bytes);
        assert_eq!(f.fe2os(fe), bytes.to_vec());
    }
}
