// src/services/terminal_service.rs

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::{
        credentials,
        error::{AppError, Resource},
    },
    db::{MerchantRepository, PairingCodeRepository, TerminalRepository},
    models::{
        auth::TerminalContext,
        terminal::{
            ClaimedCredential, CreatedTerminal, IssuedCode, PairingCode, ProvisioningCode, Terminal,
            TerminalStatus,
        },
    },
};

const MAX_CODE_ATTEMPTS: usize = 10;
const DEFAULT_TERMINAL_NAME: &str = "Terminal";

/// Código encontrado no claim.
#[derive(Debug, Clone)]
pub enum ClaimTarget {
    Provisioning(ProvisioningCode),
    Pairing(PairingCode),
}

impl ClaimTarget {
    fn used_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ClaimTarget::Provisioning(c) => c.used_at,
            ClaimTarget::Pairing(c) => c.used_at,
        }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        match self {
            ClaimTarget::Provisioning(c) => c.expires_at,
            ClaimTarget::Pairing(c) => c.expires_at,
        }
    }

    fn device_identifier(&self) -> Option<&str> {
        match self {
            ClaimTarget::Provisioning(c) => c.device_identifier.as_deref(),
            ClaimTarget::Pairing(c) => c.device_identifier.as_deref(),
        }
    }

    fn terminal_id(&self) -> Option<Uuid> {
        match self {
            ClaimTarget::Provisioning(c) => c.terminal_id,
            ClaimTarget::Pairing(c) => Some(c.terminal_id),
        }
    }

    fn merchant_id(&self) -> Uuid {
        match self {
            ClaimTarget::Provisioning(c) => c.merchant_id,
            ClaimTarget::Pairing(c) => c.merchant_id,
        }
    }
}

/// Escolhe entre os dois tipos de código com o mesmo valor: o não usado vence;
/// se ambos foram usados, vence o uso mais recente.
pub fn pick_claim_target(
    provisioning: Option<ProvisioningCode>,
    pairing: Option<PairingCode>,
) -> Option<ClaimTarget> {
    match (provisioning, pairing) {
        (None, None) => None,
        (Some(p), None) => Some(ClaimTarget::Provisioning(p)),
        (None, Some(p)) => Some(ClaimTarget::Pairing(p)),
        (Some(prov), Some(pair)) => {
            let prov_key = (prov.used_at.is_none(), prov.used_at);
            let pair_key = (pair.used_at.is_none(), pair.used_at);
            if pair_key > prov_key {
                Some(ClaimTarget::Pairing(pair))
            } else {
                Some(ClaimTarget::Provisioning(prov))
            }
        }
    }
}

/// Situação do código em relação ao dispositivo que tenta usá-lo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeState {
    Fresh,
    Expired,
    /// Mesmo dispositivo repetindo o claim (resposta perdida, app reinstalado).
    Replay { terminal_id: Uuid },
    UsedByOther,
}

pub fn classify_code(target: &ClaimTarget, identifier: &str, now: DateTime<Utc>) -> CodeState {
    if target.used_at().is_some() {
        return match (target.device_identifier(), target.terminal_id()) {
            (Some(device), Some(terminal_id)) if device == identifier => CodeState::Replay { terminal_id },
            _ => CodeState::UsedByOther,
        };
    }

    if target.expires_at() <= now {
        return CodeState::Expired;
    }

    CodeState::Fresh
}

pub struct ClaimCodeCommand {
    pub code: String,
    pub identifier: String,
    pub name: Option<String>,
    pub model: Option<String>,
}

#[derive(Clone)]
pub struct TerminalService {
    terminal_repo: TerminalRepository,
    code_repo: PairingCodeRepository,
    merchant_repo: MerchantRepository,
    pool: PgPool,
    code_ttl: chrono::Duration,
    rotation_grace: chrono::Duration,
}

impl TerminalService {
    pub fn new(
        terminal_repo: TerminalRepository,
        code_repo: PairingCodeRepository,
        merchant_repo: MerchantRepository,
        pool: PgPool,
        code_ttl: chrono::Duration,
        rotation_grace: chrono::Duration,
    ) -> Self {
        Self {
            terminal_repo,
            code_repo,
            merchant_repo,
            pool,
            code_ttl,
            rotation_grace,
        }
    }

    // ---
    // CÓDIGOS (painel)
    // ---

    /// Código para provisionar um terminal novo.
    pub async fn create_provisioning_code(&self, merchant_id: Uuid, name: Option<&str>) -> Result<IssuedCode, AppError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = credentials::generate_pairing_code();
            if self.code_repo.is_code_in_use(&self.pool, &code).await? {
                continue;
            }

            let expires_at = Utc::now() + self.code_ttl;
            if let Some(row) = self
                .code_repo
                .insert_provisioning(&self.pool, merchant_id, &code, name, expires_at)
                .await?
            {
                info!(merchant_id = %merchant_id, attempt, "Código de provisionamento emitido");
                return Ok(IssuedCode {
                    code: row.code,
                    expires_at: row.expires_at,
                    terminal_id: None,
                });
            }
        }

        warn!(merchant_id = %merchant_id, "Esgotadas as tentativas de gerar código único");
        Err(AppError::CredentialGenerationExhausted)
    }

    /// Código para (re)parear um terminal existente. Códigos anteriores do terminal deixam de valer.
    pub async fn create_pairing_code(&self, merchant_id: Uuid, terminal_id: Uuid) -> Result<IssuedCode, AppError> {
        let terminal = self
            .terminal_repo
            .find_by_id(&self.pool, merchant_id, terminal_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Terminal))?;

        self.code_repo.expire_open_pairing_codes(&self.pool, terminal.id).await?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = credentials::generate_pairing_code();
            if self.code_repo.is_code_in_use(&self.pool, &code).await? {
                continue;
            }

            let expires_at = Utc::now() + self.code_ttl;
            if let Some(row) = self
                .code_repo
                .insert_pairing(&self.pool, merchant_id, terminal.id, &code, expires_at)
                .await?
            {
                info!(terminal_id = %terminal.id, attempt, "Código de pareamento emitido");
                return Ok(IssuedCode {
                    code: row.code,
                    expires_at: row.expires_at,
                    terminal_id: Some(terminal.id),
                });
            }
        }

        warn!(terminal_id = %terminal.id, "Esgotadas as tentativas de gerar código único");
        Err(AppError::CredentialGenerationExhausted)
    }

    /// Cadastra o terminal pelo painel e já devolve o código de pareamento.
    pub async fn create_terminal(&self, merchant_id: Uuid, name: &str) -> Result<CreatedTerminal, AppError> {
        let terminal = self
            .terminal_repo
            .create(&self.pool, merchant_id, name.trim(), None, None)
            .await?;
        info!(terminal_id = %terminal.id, "Terminal cadastrado");

        let pairing_code = self.create_pairing_code(merchant_id, terminal.id).await?;
        Ok(CreatedTerminal { terminal, pairing_code })
    }

    pub async fn list_terminals(&self, merchant_id: Uuid) -> Result<Vec<Terminal>, AppError> {
        self.terminal_repo.list(&self.pool, merchant_id).await
    }

    /// Desativa o terminal e revoga todas as chaves na hora.
    pub async fn revoke_terminal(&self, merchant_id: Uuid, terminal_id: Uuid) -> Result<Terminal, AppError> {
        let mut tx = self.pool.begin().await?;

        let terminal = self
            .terminal_repo
            .find_for_update(&mut *tx, merchant_id, terminal_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Terminal))?;

        let revoked = self.terminal_repo.revoke_keys(&mut *tx, terminal.id).await?;
        let terminal = self
            .terminal_repo
            .set_status(&mut *tx, terminal.id, TerminalStatus::Disabled)
            .await?;

        tx.commit().await?;

        info!(terminal_id = %terminal.id, revoked_keys = revoked, "Terminal revogado");
        Ok(terminal)
    }

    // ---
    // CLAIM (dispositivo, sem autenticação)
    // ---

    pub async fn claim_code(&self, cmd: ClaimCodeCommand) -> Result<ClaimedCredential, AppError> {
        if !credentials::is_valid_pairing_code(&cmd.code) {
            return Err(AppError::CodeNotFound);
        }
        let identifier = cmd.identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::InvalidInput("identificador do dispositivo vazio".into()));
        }

        let mut tx = self.pool.begin().await?;

        // 1. Trava o código (claims concorrentes do mesmo código ficam em fila)
        let provisioning = self.code_repo.lock_provisioning(&mut *tx, &cmd.code).await?;
        let pairing = self.code_repo.lock_pairing(&mut *tx, &cmd.code).await?;
        let target = pick_claim_target(provisioning, pairing).ok_or(AppError::CodeNotFound)?;

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *tx, target.merchant_id())
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;
        if merchant.suspended {
            return Err(AppError::MerchantSuspended);
        }

        // 2. Decide pelo estado do código
        let terminal = match classify_code(&target, identifier, Utc::now()) {
            CodeState::Expired => return Err(AppError::CodeExpired),
            CodeState::UsedByOther => return Err(AppError::CodeAlreadyUsedByOtherTerminal),
            CodeState::Replay { terminal_id } => {
                let terminal = self
                    .terminal_repo
                    .find_for_update(&mut *tx, merchant.id, terminal_id)
                    .await?
                    .ok_or(AppError::ResourceNotFound(Resource::Terminal))?;
                if terminal.status == TerminalStatus::Disabled {
                    return Err(AppError::TerminalDisabled);
                }
                info!(terminal_id = %terminal.id, "Claim repetido pelo mesmo dispositivo");
                terminal
            }
            CodeState::Fresh => self.bind_device(&mut tx, &target, identifier, &cmd).await?,
        };

        // 3. Nova chave; as antigas ficam válidas só durante a janela de rotação
        let generated = credentials::generate_api_key();
        let grace_secs = self.rotation_grace.num_milliseconds() as f64 / 1000.0;
        let revoked = self
            .terminal_repo
            .schedule_key_revocation(&mut *tx, terminal.id, grace_secs)
            .await?;
        self.terminal_repo
            .insert_key(&mut *tx, terminal.id, terminal.merchant_id, &generated.prefix, &generated.hash)
            .await?;

        tx.commit().await?;

        info!(
            terminal_id = %terminal.id,
            merchant_id = %terminal.merchant_id,
            key_prefix = %generated.prefix,
            keys_in_grace = revoked,
            "Credencial de terminal emitida"
        );

        Ok(ClaimedCredential {
            terminal_id: terminal.id,
            merchant_id: terminal.merchant_id,
            terminal_name: terminal.name,
            api_key: generated.secret,
        })
    }

    /// Primeiro uso do código: cria ou reaproveita o terminal e marca o código como usado.
    async fn bind_device(
        &self,
        conn: &mut PgConnection,
        target: &ClaimTarget,
        identifier: &str,
        cmd: &ClaimCodeCommand,
    ) -> Result<Terminal, AppError> {
        let existing = self
            .terminal_repo
            .find_by_identifier_for_update(&mut *conn, identifier)
            .await?;

        if let Some(other) = &existing {
            if other.merchant_id != target.merchant_id() {
                return Err(AppError::IdentifierInUse);
            }
        }

        let name = cmd.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        let model = cmd.model.as_deref().map(str::trim).filter(|m| !m.is_empty());

        match target {
            ClaimTarget::Provisioning(code) => {
                let terminal = match existing {
                    Some(terminal) => {
                        self.terminal_repo
                            .update_on_claim(&mut *conn, terminal.id, name.or(code.name.as_deref()), identifier, model)
                            .await?
                    }
                    None => {
                        let name = name.or(code.name.as_deref()).unwrap_or(DEFAULT_TERMINAL_NAME);
                        self.terminal_repo
                            .create(&mut *conn, code.merchant_id, name, Some(identifier), model)
                            .await?
                    }
                };
                self.code_repo
                    .mark_provisioning_used(&mut *conn, code.id, terminal.id, identifier)
                    .await?;
                Ok(terminal)
            }
            ClaimTarget::Pairing(code) => {
                if let Some(other) = &existing {
                    if other.id != code.terminal_id {
                        // Outro terminal do mesmo lojista já usa esse hardware
                        return Err(AppError::IdentifierInUse);
                    }
                }
                let terminal = self
                    .terminal_repo
                    .find_for_update(&mut *conn, code.merchant_id, code.terminal_id)
                    .await?
                    .ok_or(AppError::ResourceNotFound(Resource::Terminal))?;
                let terminal = self
                    .terminal_repo
                    .update_on_claim(&mut *conn, terminal.id, name, identifier, model)
                    .await?;
                self.code_repo.mark_pairing_used(&mut *conn, code.id, identifier).await?;
                Ok(terminal)
            }
        }
    }

    // ---
    // VERIFICAÇÃO (a cada requisição do terminal)
    // ---

    pub async fn verify_key(&self, secret: &str) -> Result<TerminalContext, AppError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(AppError::InvalidTerminalKey);
        }

        let hash = credentials::hash_key(secret);
        let candidates = self
            .terminal_repo
            .find_credentials_by_prefix(&self.pool, credentials::key_prefix(secret))
            .await?;

        let credential = candidates
            .into_iter()
            .find(|c| match (&c.key_hash, &c.legacy_key) {
                (Some(stored), _) => credentials::constant_time_eq(stored.as_bytes(), hash.as_bytes()),
                (None, Some(legacy)) => credentials::constant_time_eq(legacy.as_bytes(), secret.as_bytes()),
                (None, None) => false,
            })
            .ok_or(AppError::InvalidTerminalKey)?;

        if credential.terminal_status == TerminalStatus::Disabled {
            return Err(AppError::TerminalDisabled);
        }
        if credential.merchant_suspended {
            return Err(AppError::MerchantSuspended);
        }
        if credential.merchant_login_blocked {
            return Err(AppError::MerchantBlocked);
        }

        // Chave legada em texto puro passa a ser guardada só como hash
        let upgrade = credential.key_hash.is_none().then_some(hash.as_str());
        if upgrade.is_some() {
            info!(terminal_id = %credential.terminal_id, "Chave legada migrada para hash");
        }
        self.terminal_repo.mark_key_used(&self.pool, credential.key_id, upgrade).await?;
        self.terminal_repo.touch_seen(&self.pool, credential.terminal_id).await?;

        Ok(TerminalContext {
            terminal_id: credential.terminal_id,
            merchant_id: credential.merchant_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn provisioning(used_at: Option<DateTime<Utc>>, device: Option<&str>, expires_in: Duration) -> ProvisioningCode {
        ProvisioningCode {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            code: "123456".into(),
            name: None,
            expires_at: Utc::now() + expires_in,
            used_at,
            terminal_id: used_at.map(|_| Uuid::new_v4()),
            device_identifier: device.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn pairing(used_at: Option<DateTime<Utc>>) -> PairingCode {
        PairingCode {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            terminal_id: Uuid::new_v4(),
            code: "123456".into(),
            expires_at: Utc::now() + Duration::minutes(5),
            used_at,
            device_identifier: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_code_within_ttl() {
        let target = ClaimTarget::Provisioning(provisioning(None, None, Duration::minutes(5)));
        assert_eq!(classify_code(&target, "SN-1", Utc::now()), CodeState::Fresh);
    }

    #[test]
    fn unused_code_past_ttl_is_expired() {
        let target = ClaimTarget::Provisioning(provisioning(None, None, Duration::seconds(-1)));
        assert_eq!(classify_code(&target, "SN-1", Utc::now()), CodeState::Expired);
    }

    #[test]
    fn same_device_replays_even_after_expiry() {
        let code = provisioning(Some(Utc::now()), Some("SN-1"), Duration::seconds(-60));
        let terminal_id = code.terminal_id.unwrap();
        let target = ClaimTarget::Provisioning(code);

        assert_eq!(
            classify_code(&target, "SN-1", Utc::now()),
            CodeState::Replay { terminal_id }
        );
    }

    #[test]
    fn other_device_cannot_reuse_code() {
        let target = ClaimTarget::Provisioning(provisioning(Some(Utc::now()), Some("SN-1"), Duration::minutes(5)));
        assert_eq!(classify_code(&target, "SN-2", Utc::now()), CodeState::UsedByOther);
    }

    #[test]
    fn unused_code_wins_over_used_one() {
        let used = provisioning(Some(Utc::now()), Some("SN-1"), Duration::minutes(5));
        let fresh = pairing(None);

        assert!(matches!(
            pick_claim_target(Some(used.clone()), Some(fresh)),
            Some(ClaimTarget::Pairing(_))
        ));
        assert!(matches!(
            pick_claim_target(Some(used), None),
            Some(ClaimTarget::Provisioning(_))
        ));
        assert!(pick_claim_target(None, None).is_none());
    }

    #[test]
    fn most_recent_use_wins_when_both_used() {
        let older = provisioning(Some(Utc::now() - Duration::hours(1)), Some("SN-1"), Duration::minutes(5));
        let newer = pairing(Some(Utc::now()));
        assert!(matches!(
            pick_claim_target(Some(older), Some(newer)),
            Some(ClaimTarget::Pairing(_))
        ));
    }
}
