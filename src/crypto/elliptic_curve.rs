//! Short Weierstrass elliptic curves with explicit domain parameters.
//!
//! The eMRTD PKI routinely uses Brainpool curves and even fully explicit
//! parameters, so the curve is a runtime value rather than a type. Point
//! arithmetic is plain affine double-and-add; key agreement follows
//! TR-03111 section 4.3.1.

use {
    super::prime_field::{uint_from_der_int, PrimeField, Uint},
    crate::asn1::public_key::{EcParameters, ID_PRIME_FIELD},
    anyhow::{anyhow, bail, ensure, Result},
    der::asn1::Int,
    rand::{CryptoRng, RngCore},
};

type Field = PrimeField<576, 9>;

/// Affine coordinates; `None` is the point at infinity.
pub type AffinePoint = Option<(Uint, Uint)>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EllipticCurve {
    base_field: Field,
    scalar_field: Field,
    a: Uint,
    b: Uint,
    cofactor: Uint,
    generator: (Uint, Uint),
}

impl EllipticCurve {
    pub fn new(
        p: Uint,
        a: Uint,
        b: Uint,
        generator: (Uint, Uint),
        order: Uint,
        cofactor: u64,
    ) -> Result<Self> {
        ensure!(order != p, "base and scalar fields must differ");
        let curve = Self {
            base_field: Field::new(p),
            scalar_field: Field::new(order),
            a,
            b,
            cofactor: Uint::from(cofactor),
            generator,
        };
        curve.ensure_on_curve(generator)?;
        Ok(curve)
    }

    /// Build a curve from explicit DER parameters.
    ///
    /// TR-03111 only specifies prime field curves; binary field curves
    /// are deprecated and unused in travel documents.
    pub fn from_parameters(params: &EcParameters) -> Result<Self> {
        ensure!(params.version == 1, "unsupported ECParameters version");
        ensure!(
            params.field_id.field_type == ID_PRIME_FIELD,
            "only prime fields are supported"
        );
        let modulus: Int = params.field_id.parameters.decode_as()?;
        let p: Uint = uint_from_der_int(&modulus)?;
        let order: Uint = uint_from_der_int(&params.order)?;

        let base_field = Field::new(p);
        let a = base_field.os2fe(params.curve.a.as_bytes());
        let b = base_field.os2fe(params.curve.b.as_bytes());

        // Non-singularity: 4a^3 + 27b^2 != 0.
        let four_a3 = base_field.mul(Uint::from(4), base_field.pow(a, Uint::from(3)));
        let twenty_seven_b2 = base_field.mul(Uint::from(27), base_field.pow(b, Uint::from(2)));
        ensure!(
            base_field.add(four_a3, twenty_seven_b2) != Uint::ZERO,
            "singular curve"
        );

        let cofactor = params
            .cofactor
            .as_ref()
            .map(uint_from_der_int)
            .transpose()?
            .unwrap_or(Uint::from(1));

        let mut curve = Self {
            base_field,
            scalar_field: Field::new(order),
            a,
            b,
            cofactor,
            generator: (Uint::ZERO, Uint::ZERO),
        };
        let generator = curve
            .pt_from_bytes(params.base.as_bytes())?
            .ok_or_else(|| anyhow!("generator is the point at infinity"))?;
        curve.generator = generator;
        Ok(curve)
    }

    pub fn base_field(&self) -> &Field {
        &self.base_field
    }

    pub fn scalar_field(&self) -> &Field {
        &self.scalar_field
    }

    pub fn a(&self) -> Uint {
        self.a
    }

    pub fn b(&self) -> Uint {
        self.b
    }

    pub fn cofactor(&self) -> Uint {
        self.cofactor
    }

    pub fn generator(&self) -> AffinePoint {
        Some(self.generator)
    }

    pub fn ensure_on_curve(&self, (x, y): (Uint, Uint)) -> Result<()> {
        let f = &self.base_field;
        let lhs = f.mul(y, y);
        let x3 = f.mul(f.mul(x, x), x);
        let rhs = f.add(f.add(x3, f.mul(self.a, x)), self.b);
        ensure!(lhs == rhs, "point not on curve");
        Ok(())
    }

    /// TR-03111 section 3.2 point decoding (uncompressed and infinity).
    pub fn pt_from_bytes(&self, bytes: &[u8]) -> Result<AffinePoint> {
        ensure!(!bytes.is_empty(), "empty point encoding");
        let fe_len = self.base_field.byte_len();
        match bytes[0] {
            0x00 => {
                ensure!(bytes.len() == 1, "malformed infinity encoding");
                Ok(None)
            }
            0x04 => {
                ensure!(bytes.len() == 1 + 2 * fe_len, "bad uncompressed length");
                let x = self.base_field.os2fe(&bytes[1..1 + fe_len]);
                let y = self.base_field.os2fe(&bytes[1 + fe_len..]);
                self.ensure_on_curve((x, y))?;
                Ok(Some((x, y)))
            }
            0x02 | 0x03 => bail!("compressed points are not used by eMRTDs"),
            _ => bail!("invalid point encoding"),
        }
    }

    /// Uncompressed encoding, `0x04 || x || y`; infinity is `0x00`.
    pub fn pt_to_bytes(&self, point: AffinePoint) -> Vec<u8> {
        match point {
            None => vec![0x00],
            Some((x, y)) => {
                let mut out = Vec::with_capacity(1 + 2 * self.base_field.byte_len());
                out.push(0x04);
                out.extend_from_slice(&self.base_field.fe2os(x));
                out.extend_from_slice(&self.base_field.fe2os(y));
                out
            }
        }
    }

    pub fn pt_add(&self, p: AffinePoint, q: AffinePoint) -> AffinePoint {
        let f = &self.base_field;
        let (px, py) = match p {
            None => return q,
            Some(p) => p,
        };
        let (qx, qy) = match q {
            None => return p,
            Some(q) => q,
        };
        if px == qx {
            if f.add(py, qy) == Uint::ZERO {
                return None;
            }
            return self.pt_double(p);
        }
        // lambda = (qy - py) / (qx - px)
        let lambda = f.mul(f.sub(qy, py), f.inv(f.sub(qx, px)).expect("qx != px"));
        let x = f.sub(f.sub(f.mul(lambda, lambda), px), qx);
        let y = f.sub(f.mul(lambda, f.sub(px, x)), py);
        Some((x, y))
    }

    pub fn pt_double(&self, p: AffinePoint) -> AffinePoint {
        let f = &self.base_field;
        let (px, py) = p?;
        if py == Uint::ZERO {
            return None;
        }
        // lambda = (3 px^2 + a) / (2 py)
        let num = f.add(f.mul(Uint::from(3), f.mul(px, px)), self.a);
        let den = f.inv(f.mul(Uint::from(2), py)).expect("py != 0");
        let lambda = f.mul(num, den);
        let x = f.sub(f.sub(f.mul(lambda, lambda), px), px);
        let y = f.sub(f.mul(lambda, f.sub(px, x)), py);
        Some((x, y))
    }

    /// Double-and-add scalar multiplication.
    pub fn pt_mul(&self, scalar: Uint, point: AffinePoint) -> AffinePoint {
        let mut acc = None;
        for i in (0..scalar.bit_len()).rev() {
            acc = self.pt_double(acc);
            if scalar.bit(i) {
                acc = self.pt_add(acc, point);
            }
        }
        acc
    }

    /// Fresh ephemeral key pair `(d, d*G)`.
    pub fn generate_keypair(
        &self,
        rng: impl CryptoRng + RngCore,
    ) -> (Uint, (Uint, Uint)) {
        let private = self.scalar_field.random_nonzero(rng);
        let public = self
            .pt_mul(private, self.generator())
            .expect("nonzero scalar times generator");
        (private, public)
    }

    /// Elliptic Curve Key Agreement, TR-03111 section 4.3.1.
    ///
    /// Returns the shared point and the shared secret `z = FE2OS(x)`.
    pub fn ecka(&self, private_key: Uint, public_key: AffinePoint) -> Result<(AffinePoint, Vec<u8>)> {
        let l = self
            .scalar_field
            .inv(self.cofactor)
            .ok_or_else(|| anyhow!("cofactor not invertible"))?;
        let q = self.pt_mul(self.cofactor, public_key);
        let s_ab = self.pt_mul(self.scalar_field.mul(private_key, l), q);
        let (x, _) = s_ab.ok_or_else(|| anyhow!("key agreement degenerated to infinity"))?;
        Ok((s_ab, self.base_field.fe2os(x)))
    }
}

/// Plain ECDSA verification over an explicit curve.
///
/// `signature` is the raw `r || s` concatenation used by Active
/// Authentication responses.
pub fn ecdsa_verify(
    curve: &EllipticCurve,
    public_key: AffinePoint,
    digest: &[u8],
    signature: &[u8],
) -> Result<()> {
    let n = curve.scalar_field();
    ensure!(
        signature.len() % 2 == 0 && !signature.is_empty(),
        "signature must be r || s"
    );
    let (r_bytes, s_bytes) = signature.split_at(signature.len() / 2);
    let r = n.os2fe(r_bytes);
    let s = n.os2fe(s_bytes);
    ensure!(r != Uint::ZERO && s != Uint::ZERO, "zero signature component");

    // Leftmost order-bits of the digest.
    let order_bits = n.modulus().bit_len();
    let take = digest.len().min((order_bits + 7) / 8);
    let mut e = super::prime_field::uint_from_be_slice::<576, 9>(&digest[..take])?;
    if take * 8 > order_bits {
        e >>= take * 8 - order_bits;
    }
    let e = if e >= n.modulus() { e - n.modulus() } else { e };

    let w = n.inv(s).ok_or_else(|| anyhow!("s not invertible"))?;
    let u1 = n.mul(e, w);
    let u2 = n.mul(r, w);
    let point = curve.pt_add(
        curve.pt_mul(u1, curve.generator()),
        curve.pt_mul(u2, public_key),
    );
    let (x, _) = point.ok_or_else(|| anyhow!("verification degenerated to infinity"))?;
    let v = if x >= n.modulus() { x - n.modulus() } else { x };
    ensure!(v == r, "ECDSA signature mismatch");
    Ok(())
}
