//! Proptest generators for property-based testing.

use proptest::prelude::*;

use pitwall_core::{
    now_millis, Classification, ContentCipher, EnvelopeCipher, KeyPair, Record, TeamId,
};

/// Generate a lowercase team name.
pub fn team_name() -> impl Strategy<Value = String> {
    "[a-z]{3,12}".prop_map(String::from)
}

/// Generate a TeamId.
pub fn team_id() -> impl Strategy<Value = TeamId> {
    team_name().prop_map(TeamId::new)
}

/// Generate a record name.
pub fn record_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

/// Generate a Classification.
pub fn classification() -> impl Strategy<Value = Classification> {
    prop_oneof![Just(Classification::Public), Just(Classification::Confidential)]
}

/// Generate a ContentCipher.
pub fn content_cipher() -> impl Strategy<Value = ContentCipher> {
    prop_oneof![
        Just(ContentCipher::Aes256Gcm),
        Just(ContentCipher::ChaCha20Poly1305)
    ]
}

/// Generate plaintext bytes of specified max length.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a small JSON telemetry document, the shape records usually carry.
pub fn json_payload() -> impl Strategy<Value = Vec<u8>> {
    (
        any::<i64>(),
        prop::collection::vec(0.0f64..400.0, 0..16),
        "[A-Z]{3}",
    )
        .prop_map(|(x, speeds, driver)| {
            serde_json::json!({ "x": x, "driver": driver, "speeds": speeds })
                .to_string()
                .into_bytes()
        })
}

/// Parameters for generating a record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub owner: TeamId,
    pub name: String,
    pub classification: Classification,
    pub cipher: ContentCipher,
    pub plaintext: Vec<u8>,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            team_id(),
            record_name(),
            classification(),
            content_cipher(),
            prop_oneof![plaintext(4096), json_payload()],
        )
            .prop_map(|(owner, name, classification, cipher, plaintext)| RecordParams {
                owner,
                name,
                classification,
                cipher,
                plaintext,
            })
            .boxed()
    }
}

/// Create a record from parameters, sealed and signed with `keys`.
pub fn record_from_params(params: &RecordParams, keys: &KeyPair) -> Record {
    Record::create(
        &EnvelopeCipher::new(params.cipher),
        &params.owner,
        keys,
        &params.name,
        params.classification,
        &params.plaintext,
        now_millis(),
    )
    .expect("record creation with canned keys")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::canned_key_pair;
    use pitwall_core::{integrity_digest, SignatureService};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_generated_record_opens(params: RecordParams) {
            let keys = canned_key_pair(0);
            let record = record_from_params(&params, &keys);

            let opened = EnvelopeCipher::decrypt(&record.content, keys.private_key()).unwrap();
            prop_assert_eq!(&opened[..], &params.plaintext[..]);
            prop_assert_eq!(record.content.cipher, params.cipher);
            prop_assert_eq!(record.integrity_digest, integrity_digest(&params.plaintext));
            prop_assert!(SignatureService::verify(&params.plaintext, &record.signature, keys.public_key()));
        }

        #[test]
        fn test_json_payload_parses(payload in json_payload()) {
            let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
            prop_assert!(value.get("x").is_some());
        }

        #[test]
        fn test_team_id_is_normalized(team in team_id()) {
            prop_assert_eq!(TeamId::new(team.as_str().to_uppercase()), team);
        }
    }
}
