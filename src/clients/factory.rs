//! 客户端工厂
//!
//! 持有 服务商 → 构造函数 的注册表和 服务商 → 实例 的缓存。
//! 缓存是整个系统唯一共享的可变状态，只有工厂会修改它。

use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{GeminiClient, MockClient, OpenAiClient, ProviderClient};
use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::models::{ClientHealthRecord, ClientStatus, ProviderId};

/// 客户端构造函数
pub type ClientConstructor =
    Arc<dyn Fn(&Config) -> AppResult<Arc<dyn ProviderClient>> + Send + Sync>;

/// 客户端工厂
pub struct ClientFactory {
    config: Config,
    registry: RwLock<HashMap<ProviderId, ClientConstructor>>,
    cache: RwLock<HashMap<ProviderId, Arc<dyn ProviderClient>>>,
}

impl ClientFactory {
    /// 创建工厂并登记内置服务商
    pub fn new(config: Config) -> Self {
        let factory = Self {
            config,
            registry: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        };

        factory.register(ProviderId::Mock, Arc::new(build_mock));
        factory.register(ProviderId::OpenAi, Arc::new(build_openai));
        factory.register(ProviderId::Gemini, Arc::new(build_gemini));

        factory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 登记（或替换）某个服务商的构造函数
    ///
    /// 替换时会清掉该服务商的缓存实例。
    pub fn register(&self, provider: ProviderId, constructor: ClientConstructor) {
        self.registry.write().insert(provider, constructor);
        self.cache.write().remove(&provider);
    }

    /// 已登记的服务商（按名称排序）
    pub fn supported_providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.registry.read().keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }

    /// 按名称判断是否受支持（忽略大小写）
    pub fn is_provider_supported(&self, name: &str) -> bool {
        ProviderId::parse(name).is_some_and(|p| self.registry.read().contains_key(&p))
    }

    /// 查看缓存实例，不会触发构造
    pub fn cached_client(&self, provider: ProviderId) -> Option<Arc<dyn ProviderClient>> {
        self.cache.read().get(&provider).cloned()
    }

    /// 清除缓存：指定服务商只清一个，`None` 清空全部
    pub fn clear_cache(&self, provider: Option<ProviderId>) {
        let mut cache = self.cache.write();
        match provider {
            Some(p) => {
                cache.remove(&p);
                debug!("已清除 {} 客户端缓存", p);
            }
            None => {
                cache.clear();
                debug!("已清除全部客户端缓存");
            }
        }
    }

    fn construct(&self, provider: ProviderId) -> AppResult<Arc<dyn ProviderClient>> {
        let constructor = self.registry.read().get(&provider).cloned();
        let Some(constructor) = constructor else {
            let available = self
                .supported_providers()
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::UnsupportedProvider {
                name: provider.as_str().to_string(),
                available,
            }
            .into());
        };
        constructor(&self.config)
    }

    /// 获取客户端
    ///
    /// `use_cache` 为 true 且已有缓存时直接返回同一个实例。
    /// 新建的实例必须 `is_configured()`，否则返回 `ProviderNotConfigured` 且不写缓存。
    pub fn create_client(
        &self,
        provider: ProviderId,
        use_cache: bool,
    ) -> AppResult<Arc<dyn ProviderClient>> {
        if use_cache {
            if let Some(client) = self.cached_client(provider) {
                return Ok(client);
            }
        }

        let client = self.construct(provider)?;
        if !client.is_configured() {
            warn!("{} 客户端未配置", provider);
            return Err(ConfigError::ProviderNotConfigured { provider }.into());
        }

        if use_cache {
            // 构造完成后才写缓存，并发时后写者覆盖
            self.cache.write().insert(provider, client.clone());
        }
        debug!("已创建 {} 客户端", provider);
        Ok(client)
    }

    /// 扫描全部已登记服务商的状态
    ///
    /// 单个服务商失败不会中断扫描。结果按"可用优先，其次名称"排序。
    pub async fn available_clients(&self) -> Vec<ClientHealthRecord> {
        let mut records = Vec::new();

        for provider in self.supported_providers() {
            let mut record = ClientHealthRecord::new(provider);

            let client = match self.construct(provider) {
                Ok(client) => client,
                Err(e) => {
                    warn!("{} 客户端构造失败: {}", provider, e);
                    record.error = Some(e.to_string());
                    records.push(record);
                    continue;
                }
            };

            record.is_configured = client.is_configured();
            if record.is_configured {
                record.is_healthy = client.health_check().await;
            }
            if record.is_healthy {
                record.capabilities = Some(client.capabilities());
            }
            record.status = match (record.is_configured, record.is_healthy) {
                (true, true) => ClientStatus::Available,
                (true, false) => ClientStatus::ConfiguredButUnhealthy,
                (false, _) => ClientStatus::NotConfigured,
            };
            records.push(record);
        }

        sort_records(&mut records);
        records
    }

    /// 按优先级 openai > gemini > mock 选择健康的客户端
    pub async fn create_best_available_client(&self) -> Option<Arc<dyn ProviderClient>> {
        let records = self.available_clients().await;
        let healthy: Vec<ProviderId> = records
            .iter()
            .filter(|r| r.is_available())
            .map(|r| r.provider)
            .collect();

        let chosen = ProviderId::PRIORITY
            .iter()
            .copied()
            .find(|p| healthy.contains(p))
            .or_else(|| healthy.first().copied())?;

        info!("选择可用的 AI 服务商: {}", chosen);
        self.create_client(chosen, true).ok()
    }

    /// 默认客户端
    ///
    /// 依次尝试：配置的默认服务商 → 最佳可用客户端 → 模拟客户端。
    pub async fn create_default_client(&self) -> Arc<dyn ProviderClient> {
        if let Some(name) = self.config.default_provider.as_deref() {
            match name.parse::<ProviderId>() {
                Ok(provider) => match self.create_client(provider, true) {
                    Ok(client) => return client,
                    Err(e) => warn!("默认服务商 {} 不可用: {}", provider, e),
                },
                Err(e) => warn!("{}", e),
            }
        }

        if let Some(client) = self.create_best_available_client().await {
            return client;
        }

        warn!("没有可用的 AI 服务商，回退到模拟客户端");
        self.create_client(ProviderId::Mock, true)
            .unwrap_or_else(|_| Arc::new(MockClient::new()))
    }

    /// 对每个已登记服务商做健康检查（复用缓存实例）
    pub async fn health_check_all(&self) -> HashMap<ProviderId, bool> {
        let checks = self.supported_providers().into_iter().map(|provider| async move {
            let healthy = match self.create_client(provider, true) {
                Ok(client) => client.health_check().await,
                Err(_) => false,
            };
            (provider, healthy)
        });
        join_all(checks).await.into_iter().collect()
    }
}

// ========== 内置构造函数 ==========

fn build_mock(_: &Config) -> AppResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(MockClient::new()))
}

fn build_openai(config: &Config) -> AppResult<Arc<dyn ProviderClient>> {
    Ok(Arc::new(OpenAiClient::new(config)))
}

fn build_gemini(config: &Config) -> AppResult<Arc<dyn ProviderClient>> {
    let client = GeminiClient::new(config).map_err(|e| ConfigError::ClientConstructionFailed {
        provider: ProviderId::Gemini,
        reason: e.to_string(),
    })?;
    Ok(Arc::new(client))
}

/// 可用的排前面，其余按名称
fn sort_records(records: &mut [ClientHealthRecord]) {
    records.sort_by(|a, b| {
        b.is_available()
            .cmp(&a.is_available())
            .then_with(|| a.provider.as_str().cmp(b.provider.as_str()))
    });
}
