//! Diffie-Hellman over mod-p groups, for the DH flavours of PACE and
//! Chip Authentication.

use {
    super::prime_field::{uint_from_der_int, PrimeField},
    crate::asn1::public_key::DhAlgoParameters,
    anyhow::{ensure, Result},
    rand::{CryptoRng, RngCore},
};

/// Field element width; covers every mod-p group used by eMRTDs.
pub type DhUint = ruint::Uint<2048, 32>;

type Field = PrimeField<2048, 32>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ModPGroup {
    field: Field,
    generator: DhUint,
    /// Order of the generator's subgroup.
    order: DhUint,
}

impl ModPGroup {
    pub fn new(p: DhUint, generator: DhUint, order: DhUint) -> Result<Self> {
        ensure!(generator > DhUint::from(1), "generator must exceed one");
        ensure!(generator < p, "generator must be below the modulus");
        ensure!(order > DhUint::from(1), "trivial subgroup order");
        Ok(Self {
            field: Field::new(p),
            generator,
            order,
        })
    }

    /// Build a group from RFC 3279 `DomainParameters` (dhpublicnumber).
    pub fn from_parameters(params: &DhAlgoParameters) -> Result<Self> {
        let p = uint_from_der_int(&params.prime)?;
        let g = uint_from_der_int(&params.base)?;
        let q = uint_from_der_int(&params.order)?;
        Self::new(p, g, q)
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn generator(&self) -> DhUint {
        self.generator
    }

    pub fn order(&self) -> DhUint {
        self.order
    }

    pub fn exp(&self, base: DhUint, scalar: DhUint) -> DhUint {
        self.field.pow(base, scalar)
    }

    /// Fresh key pair `(x, g^x)` against an arbitrary generator, so the
    /// same group can be reused after PACE remaps it.
    pub fn generate_keypair(
        &self,
        generator: DhUint,
        mut rng: impl CryptoRng + RngCore,
    ) -> (DhUint, DhUint) {
        let order_field = Field::new(self.order);
        let private = order_field.random_nonzero(&mut rng);
        let public = self.exp(generator, private);
        (private, public)
    }

    /// Shared secret `peer^x`, encoded as a full-width octet string.
    pub fn agree(&self, private: DhUint, peer_public: DhUint) -> Result<(DhUint, Vec<u8>)> {
        ensure!(
            peer_public > DhUint::from(1) && peer_public < self.field.modulus(),
            "peer public value out of range"
        );
        let shared = self.exp(peer_public, private);
        ensure!(shared != DhUint::from(1), "degenerate shared secret");
        Ok((shared, self.field.fe2os(shared)))
    }

    pub fn element_from_bytes(&self, bytes: &[u8]) -> Result<DhUint> {
        let value: DhUint = super::prime_field::uint_from_be_slice(bytes)?;
        ensure!(value < self.field.modulus(), "element out of range");
        ensure!(value > DhUint::from(1), "trivial element");
        Ok(value)
    }

    pub fn element_to_bytes(&self, element: DhUint) -> Vec<u8> {
        self.field.fe2os(element)
    }

    /// Integrated Mapping exponent map: `x -> x^((p-1)/q)` lands in the
    /// order-q subgroup. See ICAO 9303-11 section 9.5.4.
    pub fn map_to_subgroup(&self, x: DhUint) -> Result<DhUint> {
        let exp = (self.field.modulus() - DhUint::from(1)) / self.order;
        let mapped = self.field.pow(x, exp);
        ensure!(mapped != DhUint::from(1), "mapped generator is trivial");
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rand::SeedableRng};

    // Small Sophie Germain style group only for arithmetic checks:
    // p = 2q + 1 with p = 227, q = 113, generator 2 of order 113.
    fn toy_group() -> ModPGroup {
        ModPGroup::new(DhUint::from(227u64), DhUint::from(4u64), DhUint::from(113u64)).unwrap()
    }

    #[test]
    fn test_agreement_commutes() {
        let group = toy_group();
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let (xa, ya) = group.generate_keypair(group.generator(), &mut rng);
        let (xb, yb) = group.generate_keypair(group.generator(), &mut rng);
        let (sa, za) = group.agree(xa, yb).unwrap();
        let (sb, zb) = group.agree(xb, ya).unwrap();
        assert_eq!(sa, sb);
        assert_eq!(za, zb);
    }

    #[test]
    fn test_map_to_subgroup() {
        let group = toy_group();
        // Mapped element must have order dividing q: m^q == 1.
        let mapped = group.map_to_subgroup(DhUint::from(5u64)).unwrap();
        assert_eq!(group.exp(mapped, group.order()), DhUint::from(1));
    }
}
