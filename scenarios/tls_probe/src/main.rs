use gale_net_runner::prelude::*;

const DEFAULT_URL: &str = "https://www.test1.com:8080";
const EXPECTED_CIPHER_SUITE: &str = "TLS_RSA_WITH_AES_128_GCM_SHA256";

fn agent_behaviour(ctx: &mut AgentContext<NetRunnerContext, NetAgentContext>) -> HookResult {
    let response = match https_get_target(ctx) {
        Ok(response) => response,
        Err(e) => {
            // Nothing was negotiated, so neither property holds for this iteration.
            ctx.record_check("is TLSv1.2", false);
            ctx.record_check("is sha256 cipher suite", false);
            return Err(e);
        }
    };

    ctx.check_all(
        &response,
        &[
            ("is TLSv1.2", &|r: &HttpsResponse| {
                r.tls_version() == Some(TlsVersion::Tls12)
            }),
            ("is sha256 cipher suite", &|r: &HttpsResponse| {
                r.cipher_suite() == Some(EXPECTED_CIPHER_SUITE)
            }),
        ],
    );

    Ok(())
}

fn configure(
    builder: ScenarioDefinitionBuilder<NetRunnerContext, NetAgentContext>,
) -> ScenarioDefinitionBuilder<NetRunnerContext, NetAgentContext> {
    builder
        .with_default_target(DEFAULT_URL)
        .with_default_duration_s(10)
        .with_default_tls_policy(TlsPolicy {
            min_version: TlsVersion::Tls11,
            max_version: TlsVersion::Tls12,
            cipher_suites: CipherSuites::only([
                "TLS_RSA_WITH_RC4_128_SHA",
                "TLS_RSA_WITH_AES_128_GCM_SHA256",
            ]),
            insecure_skip_verify: false,
        })
        .use_setup(configure_net_client)
        .use_agent_behaviour(agent_behaviour)
}

fn main() -> GaleResult<()> {
    let builder = ScenarioDefinitionBuilder::<NetRunnerContext, NetAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    );

    run(configure(builder))?;

    Ok(())
}
