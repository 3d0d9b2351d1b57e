//! Query Dispatcher
//!
//! Routes each AAAA question to a resolver by name suffix. Routes are
//! checked in order and the first AAAA question that matches any route is
//! the only one answered.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::MixinConfig;
use crate::crypto::BaseIdentity;
use crate::dns::codec::Message;
use crate::dns::error::QueryError;
use crate::dns::resolver::{AnswerProducer, HostnameResolver, KeyResolver};
use crate::types::TYPE_AAAA;

struct Route {
    suffix: String,
    producer: Box<dyn AnswerProducer>,
}

pub struct QueryDispatcher {
    routes: Vec<Route>,
    ttl: u32,
}

impl QueryDispatcher {
    /// Create an empty dispatcher answering with the given TTL
    pub fn new(ttl: u32) -> Self {
        Self {
            routes: Vec::new(),
            ttl,
        }
    }

    /// Standard dispatcher: hostname suffix first, then key suffix
    pub fn from_config(config: &MixinConfig, identity: Arc<BaseIdentity>) -> Self {
        Self::new(config.ttl)
            .with_route(&config.hostname_suffix, HostnameResolver::new(identity))
            .with_route(&config.key_suffix, KeyResolver::new())
    }

    /// Append a route with lower priority than the existing ones
    pub fn with_route(mut self, suffix: &str, producer: impl AnswerProducer + 'static) -> Self {
        self.routes.push(Route {
            suffix: suffix.to_string(),
            producer: Box::new(producer),
        });
        self
    }

    /// Produce the response for a parsed query
    pub fn dispatch(&self, request: &Message) -> Result<Message, QueryError> {
        if request.header.is_response() || request.header.opcode() != 0 {
            trace!("Ignoring non-query message id={}", request.header.id);
            return Err(QueryError::NoAnswerableQuestion);
        }

        for question in &request.questions {
            if question.qtype != TYPE_AAAA {
                continue;
            }

            for route in &self.routes {
                let Some(label) = question.name.strip_suffix_ignore_case(&route.suffix) else {
                    continue;
                };

                debug!(
                    "{} query for {} (label {:?}, suffix {})",
                    route.producer.kind(),
                    question.name,
                    String::from_utf8_lossy(&label),
                    route.suffix
                );

                let address = route.producer.produce(&label)?;
                debug_assert!(address.is_valid());
                return Ok(Message::aaaa_answer(request, question, address, self.ttl));
            }
        }

        Err(QueryError::NoAnswerableQuestion)
    }
}
