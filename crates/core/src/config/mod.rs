//! 网关配置
//!
//! 配置在启动时一次性加载并校验，然后以显式参数的形式传入分发核心，
//! 不存在全局的默认客户端或配置单例。
//!
//! 加载顺序：
//! 1. 内置默认值（四个下游服务的端点与路由）
//! 2. TOML 配置文件
//! 3. `GATEWAY_` 前缀的环境变量（层级之间使用 `__` 分隔）

pub mod models;

pub use models::*;
