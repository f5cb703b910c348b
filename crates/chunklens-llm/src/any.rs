#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{Completion, CompletionRequest, LlmProvider};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, crate::LlmError> {
        delegate_provider!(self, |p| p.complete(request).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }

    fn model(&self) -> &str {
        delegate_provider!(self, |p| p.model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai() -> AnyProvider {
        AnyProvider::OpenAi(OpenAiProvider::new(
            "key".into(),
            "http://127.0.0.1:1".into(),
            "gpt-4o-mini".into(),
        ))
    }

    #[test]
    fn openai_name_and_model_delegate() {
        let p = openai();
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model(), "gpt-4o-mini");
    }

    #[test]
    fn debug_names_variant() {
        assert!(format!("{:?}", openai()).contains("OpenAi"));
    }

    #[tokio::test]
    async fn openai_unreachable_errors() {
        let p = openai();
        assert!(p.complete(&CompletionRequest::new("hi")).await.is_err());
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn mock_dispatches() {
        let p = AnyProvider::Mock(MockProvider::with_responses(vec!["from mock".into()]));
        let completion = p.complete(&CompletionRequest::new("x")).await.unwrap();
        assert_eq!(completion.content, "from mock");
        assert_eq!(p.name(), "mock");
    }
}
