#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mapi_auth::{Credentials, ProtocolVersion, ResponseParams};
use mapi_protocol::Challenge;

#[derive(Debug, Arbitrary)]
struct FuzzChallengeInput {
    challenge: String,
    username: String,
    password: String,
    database: String,
    hash: Option<String>,
}

fuzz_target!(|input: FuzzChallengeInput| {
    let Ok(challenge) = Challenge::parse(&input.challenge) else {
        return;
    };

    let mut params = ResponseParams::new(
        Credentials::new(input.username, input.password),
        input.database,
    );
    if let Some(hash) = input.hash {
        params = params.with_hash(hash);
    }

    // Both strategies must reject bad tokens without panicking
    for version in [ProtocolVersion::V8, ProtocolVersion::V9] {
        let _ = version.build_response(&params, challenge.tokens().as_slice());
    }
});
