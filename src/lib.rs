//! prompt-relay: a completion relay gateway that races upstream AI providers
//! prompt-relay: 对上游AI提供商进行竞速的补全中继网关
//!
//! The gateway accepts a single prompt-completion request over HTTP, fans it
//! out concurrently to every configured provider, and answers with the first
//! successful completion. Losing calls are aborted once a winner resolves.
//!
//! 网关通过HTTP接受单个提示补全请求，并发地分发给所有已配置的提供商，
//! 并以第一个成功的补全作为响应。一旦产生获胜者，失败方的调用将被中止。

pub mod config;
pub mod relay;
