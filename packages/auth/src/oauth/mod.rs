// ABOUTME: Generic OAuth 2.0 provider plug-ins and the known provider catalog
// ABOUTME: Authorization code with PKCE, device authorization, and local tokens

pub mod authorization_code;
pub mod catalog;
pub mod client;
pub mod config;
pub mod device;
pub mod local;
pub mod pkce;
pub mod prompt;
pub mod server;

pub use authorization_code::{AuthorizationCodeProvider, BrowserFlowSettings};
pub use catalog::{default_registry, registry_from_source, FlowKind, KnownProvider};
pub use client::TokenEndpointClient;
pub use config::OAuthClientConfig;
pub use device::{
    poll_for_grant, DeviceAuthorization, DeviceFlowClient, DeviceFlowProvider,
    DevicePollResponse, HttpDeviceFlowClient,
};
pub use local::LocalTokenProvider;
pub use pkce::PkceChallenge;
pub use prompt::{stderr_prompt, FlowPrompt, PromptHandler};
pub use server::{CallbackParams, CallbackServer};
