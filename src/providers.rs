use std::sync::Arc;

use agent_provider::RunProvider;
use agent_provider_mock::{ScriptedProvider, MOCK_PROVIDER_ID};

pub fn provider_for_id(provider_id: &str) -> Result<Arc<dyn RunProvider>, String> {
    match provider_id {
        MOCK_PROVIDER_ID => Ok(Arc::new(ScriptedProvider::default())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {MOCK_PROVIDER_ID}"
        )),
    }
}
