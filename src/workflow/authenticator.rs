//! 登录状态机 - 流程层
//!
//! 状态顺序：
//! Start → NavigateToLogin → [ResolveChallenge] → [FollowSsoRedirect] → SubmitCredentials
//!       → AwaitRedirect → [ReloadOnce] → Verify → Authenticated
//!
//! 任一状态失败即终止，返回分类错误。每一次等待都有上界。

use std::time::Duration;
use tracing::{debug, info, warn};

use super::verify::{verify_landing, LandingPage};
use crate::browser::{BrowserCapability, WaitCondition, WaitOptions};
use crate::models::{Credential, Session, TargetDescriptor};
use crate::services::ChallengeSolver;
use crate::taxonomy::{ClassifiedError, ErrorKind, StageResult};

/// 登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    NavigateToLogin,
    ResolveChallenge,
    FollowSsoRedirect,
    SubmitCredentials,
    AwaitRedirect,
    ReloadOnce,
    Verify,
    Authenticated,
}

/// 一次运行一个实例
pub struct Authenticator<'a> {
    browser: &'a dyn BrowserCapability,
    target: &'a TargetDescriptor,
    solver: &'a ChallengeSolver<'a>,
    navigation_timeout: Duration,
    /// 已经离开目标自身的登录页（字段缺失时据此区分错误种类）
    past_sso: bool,
    trail: Vec<LoginState>,
}

impl<'a> Authenticator<'a> {
    pub fn new(
        browser: &'a dyn BrowserCapability,
        target: &'a TargetDescriptor,
        solver: &'a ChallengeSolver<'a>,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            browser,
            target,
            solver,
            navigation_timeout,
            past_sso: false,
            trail: Vec::new(),
        }
    }

    /// 经历过的状态（含终态）
    pub fn trail(&self) -> &[LoginState] {
        &self.trail
    }

    /// 驱动状态机直到终态
    pub async fn login(&mut self, credential: &Credential) -> StageResult<Session<'a>> {
        info!(
            "[{}] 🔐 开始登录 ({:?}) 用户 {}",
            self.target.id,
            self.target.login.flow,
            credential.masked_id()
        );

        let mut state = LoginState::Start;
        loop {
            self.trail.push(state);
            debug!("[{}] 登录状态: {:?}", self.target.id, state);

            state = match state {
                LoginState::Start => LoginState::NavigateToLogin,
                LoginState::NavigateToLogin => self.navigate_to_login().await?,
                LoginState::ResolveChallenge => self.resolve_challenge().await?,
                LoginState::FollowSsoRedirect => self.follow_sso_redirect().await?,
                LoginState::SubmitCredentials => self.submit_credentials(credential).await?,
                LoginState::AwaitRedirect => self.await_redirect().await?,
                LoginState::ReloadOnce => self.reload_once().await?,
                LoginState::Verify => self.verify().await?,
                LoginState::Authenticated => break,
            };
        }

        let url = self.current_url().await?;
        info!("[{}] ✓ 登录成功: {}", self.target.id, url);
        Ok(Session::new(self.browser, self.target.id.clone(), url))
    }

    async fn navigate_to_login(&mut self) -> StageResult<LoginState> {
        self.browser
            .navigate(
                &self.target.login_url,
                WaitCondition::Load,
                self.navigation_timeout,
            )
            .await
            .map_err(|e| e.classify_navigation())?;

        let login = &self.target.login;
        Ok(if login.challenge.is_some() {
            LoginState::ResolveChallenge
        } else {
            self.after_challenge()
        })
    }

    fn after_challenge(&self) -> LoginState {
        if self.target.login.uses_sso() {
            LoginState::FollowSsoRedirect
        } else {
            LoginState::SubmitCredentials
        }
    }

    async fn resolve_challenge(&mut self) -> StageResult<LoginState> {
        let challenge = self.target.login.challenge.as_ref().ok_or_else(|| {
            ClassifiedError::new(ErrorKind::ChallengeChanged, "目标未配置验证码")
        })?;
        info!("[{}] 🎧 出现语音验证码", self.target.id);
        self.solver.solve(self.browser, challenge).await?;
        Ok(self.after_challenge())
    }

    async fn follow_sso_redirect(&mut self) -> StageResult<LoginState> {
        let target = self.target;
        let login = &target.login;
        let button = login.sso_button_selector.as_deref().ok_or_else(|| {
            ClassifiedError::new(ErrorKind::LoginPageChanged, "SSO 流程缺少跳转按钮")
        })?;

        self.browser
            .wait_for_element(button, WaitOptions::visible(login.field_timeout()))
            .await
            .map_err(|e| e.classify_wait(ErrorKind::LoginPageChanged))?;
        self.browser
            .click(button)
            .await
            .map_err(|e| e.classify_wait(ErrorKind::LoginPageChanged))?;
        self.settle("SSO 跳转").await?;

        self.past_sso = true;
        debug!("[{}] 已跳转到身份提供方: {}", self.target.id, self.current_url().await?);
        Ok(LoginState::SubmitCredentials)
    }

    async fn submit_credentials(&mut self, credential: &Credential) -> StageResult<LoginState> {
        let login = &self.target.login;
        let missing = self.structural_kind();
        let wait = WaitOptions::visible(login.field_timeout());

        for selector in [&login.username_selector, &login.password_selector] {
            self.browser
                .wait_for_element(selector, wait)
                .await
                .map_err(|e| e.classify_wait(missing))?;
        }

        self.browser
            .type_text(&login.username_selector, credential.id())
            .await
            .map_err(|e| e.classify_wait(missing))?;
        self.browser
            .type_text(&login.password_selector, credential.secret())
            .await
            .map_err(|e| e.classify_wait(missing))?;

        Ok(LoginState::AwaitRedirect)
    }

    async fn await_redirect(&mut self) -> StageResult<LoginState> {
        self.browser
            .click(&self.target.login.submit_selector)
            .await
            .map_err(|e| e.classify_wait(self.structural_kind()))?;
        self.settle("提交凭据").await?;

        Ok(if self.target.requires_reload_after_login {
            LoginState::ReloadOnce
        } else {
            LoginState::Verify
        })
    }

    /// 该目标登录后会先闪出错误页：强制刷新一次，只一次
    async fn reload_once(&mut self) -> StageResult<LoginState> {
        let url = self.current_url().await?;
        info!("[{}] 🔄 登录后强制刷新一次: {}", self.target.id, url);
        self.browser
            .navigate(&url, WaitCondition::Load, self.navigation_timeout)
            .await
            .map_err(|e| e.classify_navigation())?;
        Ok(LoginState::Verify)
    }

    async fn verify(&mut self) -> StageResult<LoginState> {
        let page = LandingPage {
            url: self.current_url().await?,
            title: self
                .browser
                .title()
                .await
                .map_err(|e| e.classify_as(ErrorKind::ScriptError))?,
            content: self
                .browser
                .content()
                .await
                .map_err(|e| e.classify_as(ErrorKind::ScriptError))?,
        };

        if let Err(err) = verify_landing(&page, self.target) {
            warn!("[{}] 登录判定失败: {}", self.target.id, err);
            return Err(err);
        }
        Ok(LoginState::Authenticated)
    }

    /// 等待提交后的导航；超时不算失败，交给 Verify 判定停在了哪里
    async fn settle(&self, what: &str) -> StageResult<()> {
        match self.browser.wait_for_navigation(self.navigation_timeout).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_timeout() => {
                debug!("[{}] {} 后没有导航: {}", self.target.id, what, e);
                Ok(())
            }
            Err(e) => Err(e.classify_navigation()),
        }
    }

    fn structural_kind(&self) -> ErrorKind {
        if self.past_sso {
            ErrorKind::PostSsoPageChanged
        } else {
            ErrorKind::LoginPageChanged
        }
    }

    async fn current_url(&self) -> StageResult<String> {
        self.browser
            .current_url()
            .await
            .map_err(|e| e.classify_as(ErrorKind::ScriptError))
    }
}
