//! The ICAO Doc 9303-11 Appendix G.1 PACE-ECDH-GM worked example on
//! brainpoolP256r1, replayed with the published ephemeral keys.

mod common;

use {
    emrtd_reader::{
        asn1::security_info::PaceInfo,
        crypto::{prime_field::uint_from_be_slice, standard_params::standardized_curve},
        pace,
        reader::TagReader,
        secure_messaging::SymmetricCipher,
        transport::{Transport, TransportError},
    },
    der::{asn1::ObjectIdentifier as Oid, Decode},
    hex_literal::hex,
};

/// Acts exactly like the card in Doc 9303-11 Appendix G.1; unexpected
/// traffic is answered with 0x6988.
struct AppendixG1Card {
    state: u8,
}

impl AppendixG1Card {
    const EXPECTED_MSE_SET_AT: [u8; 20] =
        hex!("0022C1A40F 800A04007F00070202040202 830101");
    const EXPECTED_GA_INITIAL: [u8; 8] = hex!("10860000 02 7C00 00");
    const GA_INITIAL_RESPONSE: [u8; 22] =
        hex!("7C128010 95A3A016522EE98D01E76CB6B98B42C3 9000");
    const EXPECTED_GA_MAPPING: [u8; 75] = hex!(
        "10860000 45
         7C438141 047ACF3EFC982EC45565A4B155129EFBC74650DCBFA6362D896FC70262E0C2CC5E
         445452DCB6725218799115B55C9BAA6D9F6BC3A9618E70C25AF71777A9C4922D 00"
    );
    const GA_MAPPING_RESPONSE: [u8; 71] = hex!(
        "7C438241 04824FBA91C9CBE26BEF53A0EBE7342A3BF178CEA9F45DE0B70AA601651FBA3F57
         30D8C879AAA9C9F73991E61B58F4D52EB87A0A0C709A49DC63719363CCD13C54 9000"
    );
    const EXPECTED_GA_AGREEMENT: [u8; 75] = hex!(
        "10860000 45
         7C438341 042DB7A64C0355044EC9DF190514C625CBA2CEA48754887122F3A5EF0D5EDD301C
         3556F3B3B186DF10B857B58F6A7EB80F20BA5DC7BE1D43D9BF850149FBB36462 00"
    );
    const GA_AGREEMENT_RESPONSE: [u8; 71] = hex!(
        "7C438441 049E880F842905B8B3181F7AF7CAA9F0EFB743847F44A306D2D28C1D9EC65DF6DB
         7764B22277A2EDDC3C265A9F018F9CB852E111B768B326904B59A0193776F094 9000"
    );
    const EXPECTED_GA_MUTUAL: [u8; 18] = hex!("00860000 0C 7C0A8508 C2B0BD78D94BA866 00");
    const GA_MUTUAL_RESPONSE: [u8; 14] = hex!("7C0A8608 3ABB9674BCE93C08 9000");

    fn new() -> Self {
        Self { state: 0 }
    }
}

impl Transport for AppendixG1Card {
    fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn transceive(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response: Vec<u8> = if apdu == Self::EXPECTED_MSE_SET_AT {
            self.state = 1;
            vec![0x90, 0x00]
        } else if self.state == 1 && apdu == Self::EXPECTED_GA_INITIAL {
            self.state = 2;
            Self::GA_INITIAL_RESPONSE.to_vec()
        } else if self.state == 2 && apdu == Self::EXPECTED_GA_MAPPING {
            self.state = 3;
            Self::GA_MAPPING_RESPONSE.to_vec()
        } else if self.state == 3 && apdu == Self::EXPECTED_GA_AGREEMENT {
            self.state = 4;
            Self::GA_AGREEMENT_RESPONSE.to_vec()
        } else if self.state == 4 && apdu == Self::EXPECTED_GA_MUTUAL {
            self.state = 5;
            Self::GA_MUTUAL_RESPONSE.to_vec()
        } else {
            vec![0x69, 0x88]
        };
        Ok(response)
    }

    fn invalidate(&mut self, _message: Option<&str>) {}
}

#[test]
fn test_pace_gm_worked_example() {
    const MRZ: &str = "T22000129364081251010318";
    const MAP_PRIVATE: [u8; 32] =
        hex!("7F4EF07B9EA82FD78AD689B38D0BC78CF21F249D953BC46F4C6E19259C010F99");
    const EPH_PRIVATE: [u8; 32] =
        hex!("A73FB703AC1436A18E0CFA5ABB3F7BEC7A070E7A6788486BEE230C4A22762595");

    // The PACEInfo from the G.1 EF.CardAccess: ECDH-GM with AES-128,
    // standardized parameters 13 (brainpoolP256r1).
    let info = PaceInfo::from_der(&hex!("3012060A04007F0007020204020202010202010D")).unwrap();
    let curve = standardized_curve(13).unwrap();

    let mut reader = TagReader::new(Box::new(AppendixG1Card::new()));
    reader.connect().unwrap();

    reader
        .mse_set_at_pace(Oid::new_unwrap("0.4.0.127.0.7.2.2.4.2.2"), None)
        .unwrap();
    let nonce = pace::request_encrypted_nonce(&mut reader, SymmetricCipher::Aes128, MRZ).unwrap();
    assert_eq!(nonce[..], hex!("3F00C4D39D153F2B2A214A078D899B22"));

    let outcome = pace::establish_ecdh_gm_with_keys(
        &mut reader,
        &info,
        &curve,
        &nonce,
        uint_from_be_slice(&MAP_PRIVATE).unwrap(),
        uint_from_be_slice(&EPH_PRIVATE).unwrap(),
    )
    .unwrap();

    assert_eq!(outcome.cipher, SymmetricCipher::Aes128);
    assert!(outcome.cam_data.is_none());
    assert!(reader.is_secured());
}
