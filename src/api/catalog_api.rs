// ==========================================
// 禽类订单结算引擎 - 基础资料 API
// ==========================================
// 职责: 客户/禽类/包装/容器/价格的写入与查询
// 写入入口: apply(CatalogEvent)
// 红线: 仅校验主键/名称非空, 其余字段以调用方为准
// 副作用: 客户/禽类改名级联 (update_client / update_bird_type)
// ==========================================

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::catalog::{
    BirdType, CatalogEvent, Client, ContainerRule, PresentationRule, PriceRule,
};
use crate::repository::catalog_repo::{
    BirdTypeRepository, ClientRepository, ContainerRuleRepository, PresentationRuleRepository,
    PriceRuleRepository, RenameCascade,
};

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{} 不能为空", field)));
    }
    Ok(())
}

// ==========================================
// CatalogApi - 基础资料 API
// ==========================================
pub struct CatalogApi {
    client_repo: Arc<ClientRepository>,
    bird_type_repo: Arc<BirdTypeRepository>,
    presentation_repo: Arc<PresentationRuleRepository>,
    container_repo: Arc<ContainerRuleRepository>,
    price_repo: Arc<PriceRuleRepository>,
}

impl CatalogApi {
    pub fn new(
        client_repo: Arc<ClientRepository>,
        bird_type_repo: Arc<BirdTypeRepository>,
        presentation_repo: Arc<PresentationRuleRepository>,
        container_repo: Arc<ContainerRuleRepository>,
        price_repo: Arc<PriceRuleRepository>,
    ) -> Self {
        Self {
            client_repo,
            bird_type_repo,
            presentation_repo,
            container_repo,
            price_repo,
        }
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 应用一条基础资料事件
    pub fn apply(&self, event: CatalogEvent) -> ApiResult<()> {
        let name = event.name();
        match event {
            CatalogEvent::UpsertClient(client) => {
                self.update_client(&client)?;
            }
            CatalogEvent::DeleteClient { client_id } => {
                self.delete_client(&client_id)?;
            }
            CatalogEvent::UpsertBirdType(bird_type) => {
                self.update_bird_type(&bird_type)?;
            }
            CatalogEvent::DeleteBirdType { bird_type_id } => {
                require("bird_type_id", &bird_type_id)?;
                self.bird_type_repo.delete(&bird_type_id)?;
            }
            CatalogEvent::UpsertPresentation(rule) => {
                Self::validate_presentation(&rule)?;
                self.presentation_repo.upsert(&rule)?;
            }
            CatalogEvent::DeletePresentation { rule_id } => {
                require("rule_id", &rule_id)?;
                self.presentation_repo.delete(&rule_id)?;
            }
            CatalogEvent::UpsertContainer(rule) => {
                Self::validate_container(&rule)?;
                self.container_repo.upsert(&rule)?;
            }
            CatalogEvent::DeleteContainer { container_id } => {
                require("container_id", &container_id)?;
                self.container_repo.delete(&container_id)?;
            }
            CatalogEvent::UpsertPriceRule(rule) => {
                Self::validate_price(&rule)?;
                self.price_repo.upsert(&rule)?;
            }
            CatalogEvent::DeletePriceRule { price_id } => {
                require("price_id", &price_id)?;
                self.price_repo.delete(&price_id)?;
            }
            CatalogEvent::ReplacePresentations(rules) => {
                rules.iter().try_for_each(Self::validate_presentation)?;
                self.presentation_repo.replace_all(&rules)?;
            }
            CatalogEvent::ReplaceContainers(rules) => {
                rules.iter().try_for_each(Self::validate_container)?;
                self.container_repo.replace_all(&rules)?;
            }
            CatalogEvent::ReplacePriceRules(rules) => {
                rules.iter().try_for_each(Self::validate_price)?;
                self.price_repo.replace_all(&rules)?;
            }
        }
        info!(event = name, "基础资料已更新");
        Ok(())
    }

    /// 新增或更新客户; 改名时级联到订单/编号序列/未确认结算行
    pub fn update_client(&self, client: &Client) -> ApiResult<RenameCascade> {
        require("client_id", &client.client_id)?;
        require("client.name", &client.name)?;

        let cascade = self.client_repo.update_with_rename_cascade(client)?;
        if cascade != RenameCascade::default() {
            info!(
                client_id = %client.client_id,
                new_name = %client.name,
                orders = cascade.orders,
                sequences = cascade.sequences,
                settlement_rows = cascade.settlement_rows,
                "客户改名已级联"
            );
        }
        Ok(cascade)
    }

    /// 删除客户 (同一事务删除其价格规则)
    pub fn delete_client(&self, client_id: &str) -> ApiResult<usize> {
        require("client_id", client_id)?;
        let deleted = self.client_repo.delete(client_id)?;
        if deleted == 0 {
            debug!(client_id, "客户不存在, 无需删除");
        }
        Ok(deleted)
    }

    /// 新增或更新禽类; 改名时级联到订单
    pub fn update_bird_type(&self, bird_type: &BirdType) -> ApiResult<usize> {
        require("bird_type_id", &bird_type.bird_type_id)?;
        require("bird_type.name", &bird_type.name)?;

        let renamed = self.bird_type_repo.update_with_rename_cascade(bird_type)?;
        if renamed > 0 {
            info!(bird_type_id = %bird_type.bird_type_id, orders = renamed, "禽类改名已级联");
        }
        Ok(renamed)
    }

    fn validate_presentation(rule: &PresentationRule) -> ApiResult<()> {
        require("rule_id", &rule.rule_id)?;
        require("bird_type_id", &rule.bird_type_id)?;
        require("presentation", &rule.presentation)
    }

    fn validate_container(rule: &ContainerRule) -> ApiResult<()> {
        require("container_id", &rule.container_id)?;
        require("container_type", &rule.container_type)
    }

    fn validate_price(rule: &PriceRule) -> ApiResult<()> {
        require("price_id", &rule.price_id)?;
        require("client_id", &rule.client_id)?;
        require("bird_type_id", &rule.bird_type_id)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn list_clients(&self) -> ApiResult<Vec<Client>> {
        Ok(self.client_repo.list_all()?)
    }

    pub fn list_bird_types(&self) -> ApiResult<Vec<BirdType>> {
        Ok(self.bird_type_repo.list_all()?)
    }

    pub fn list_presentations(&self) -> ApiResult<Vec<PresentationRule>> {
        Ok(self.presentation_repo.list_all()?)
    }

    pub fn list_containers(&self) -> ApiResult<Vec<ContainerRule>> {
        Ok(self.container_repo.list_all()?)
    }

    pub fn list_price_rules(&self) -> ApiResult<Vec<PriceRule>> {
        Ok(self.price_repo.list_all()?)
    }

    pub fn find_client_by_name(&self, name: &str) -> ApiResult<Option<Client>> {
        debug!(name, "按名称查询客户");
        Ok(self.client_repo.find_by_name(name.trim())?)
    }

    pub fn find_bird_type_by_name(&self, name: &str) -> ApiResult<Option<BirdType>> {
        debug!(name, "按名称查询禽类");
        Ok(self.bird_type_repo.find_by_name(name.trim())?)
    }
}
