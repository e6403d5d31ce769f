//! 内置流程表
//!
//! 三个流程都在外交部（Cancillería）的海牙认证网站上：
//! - `consulta`：按申请编号查询文档链接
//! - `liquidacion`：按申请编号完成缴费确认
//! - `solicitud`：按证件号提交新的文档申请

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::IdentityRule;
use super::wizard::{
    Action, ChallengeSpec, Extraction, FieldSource, Marker, ModalSpec, PageSpec, Pattern,
    SheetLayout, WizardTable,
};

pub const CONSULTA_URL: &str =
    "https://tramites.cancilleria.gov.co/apostillalegalizacion/consulta/tramite.aspx";
pub const SOLICITUD_URL: &str =
    "https://tramites.cancilleria.gov.co/apostillalegalizacion/solicitud/inicio.aspx";

/// "无记录"的观察文本
pub const MSG_NOT_FOUND: &str = "No se han encontrado registros";
/// 疑似反爬的观察文本
pub const MSG_ANTIBOT: &str = "POSIBLE ANTIBOT/CAPTCHA";
/// 单条记录超时的观察文本
pub const MSG_RECORD_TIMEOUT: &str = "Tiempo máximo excedido";
/// 所有日期解释都被拒绝时的观察文本
pub const MSG_NO_DATE_ACCEPTED: &str = "Ningún formato de fecha fue aceptado";
/// 流程完成的观察文本
pub const MSG_COMPLETED: &str = "Proceso completado exitosamente";

/// 申请编号的默认格式（固定前缀 52）
pub const DEFAULT_CODE_PATTERN: &str = r"\b52\d{6,}\b";

const CAPTCHA_VALIDATOR: &str = "#contenido_validadorCaptcha";
const INFO_PANEL: &str = "#contenido_ucInfor_panInformmacion";
const INFO_MESSAGE: &str = "#contenido_ucInfor_lbMensajeEnPopup";
const INFO_CLOSE: &str = "#contenido_ucInfor_lbClose";
const WIZARD3_NEXT: &str = "#contenido_Wizard3_StepNavigationTemplateContainerID_StepNextButton";

/// 可选的流程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// 查询文档链接
    Consulta,
    /// 缴费确认
    Liquidacion,
    /// 提交新申请
    Solicitud,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workflow::Consulta => write!(f, "consulta"),
            Workflow::Liquidacion => write!(f, "liquidacion"),
            Workflow::Solicitud => write!(f, "solicitud"),
        }
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "consulta" => Ok(Workflow::Consulta),
            "liquidacion" => Ok(Workflow::Liquidacion),
            "solicitud" => Ok(Workflow::Solicitud),
            other => Err(format!("未知流程: {}", other)),
        }
    }
}

/// 缴费人信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payer {
    pub document_type: String,
    pub document_number: String,
    pub full_name: String,
    pub phone: String,
    pub email: String,
}

impl Payer {
    pub fn is_complete(&self) -> bool {
        [
            &self.document_type,
            &self.document_number,
            &self.full_name,
            &self.phone,
            &self.email,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

/// 构建内置流程表
pub fn preset(workflow: Workflow, payer: &Payer) -> WizardTable {
    match workflow {
        Workflow::Consulta => consulta(),
        Workflow::Liquidacion => liquidacion(payer),
        Workflow::Solicitud => solicitud(),
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn fill(selector: &str, value: FieldSource) -> Action {
    Action::Fill {
        selector: selector.to_string(),
        value,
    }
}

fn select(selector: &str, value: FieldSource) -> Action {
    Action::Select {
        selector: selector.to_string(),
        value,
    }
}

fn literal(value: &str) -> FieldSource {
    FieldSource::Literal(value.to_string())
}

fn check(selector: &str) -> Action {
    Action::Check {
        selector: selector.to_string(),
        attempts: 3,
    }
}

fn captcha_challenge() -> ChallengeSpec {
    ChallengeSpec {
        kind: "captcha".to_string(),
        marker: Marker::new(CAPTCHA_VALIDATOR),
        dismiss: None,
        human_clicks: vec!["h1".to_string(), "p".to_string()],
    }
}

fn recaptcha_challenge() -> ChallengeSpec {
    ChallengeSpec {
        kind: "recaptcha".to_string(),
        marker: Marker::with_text(INFO_MESSAGE, "reCaptcha"),
        dismiss: Some(INFO_CLOSE.to_string()),
        human_clicks: vec!["h1".to_string(), "p".to_string()],
    }
}

fn form_errors() -> Vec<Marker> {
    vec![
        Marker::new(".error_validacion"),
        Marker::new(".alert-danger"),
    ]
}

fn consulta_page() -> PageSpec {
    PageSpec {
        name: "consulta".to_string(),
        ready: Marker::new("#contenido_tbNumeroSolicitud"),
        actions: vec![
            fill("#contenido_tbNumeroSolicitud", FieldSource::Code),
            fill(
                "#contenido_ucCorreoElectronico_tbCorreoElectronico",
                FieldSource::Email,
            ),
        ],
        trigger: "#contenido_btnBuscar".to_string(),
        settle_ms: 0,
        success: Marker::new("#contenido_ucInfor_lblMensajes2 a"),
        extract: None,
        not_found: Some(Marker::with_text("body", MSG_NOT_FOUND)),
        challenge: Some(captcha_challenge()),
        validation: Vec::new(),
        watch_modal: false,
    }
}

fn consulta() -> WizardTable {
    let mut page = consulta_page();
    page.extract = Some(Extraction::Href {
        selector: "#contenido_ucInfor_lblMensajes2 a".to_string(),
    });

    WizardTable {
        name: Workflow::Consulta.to_string(),
        entry_url: CONSULTA_URL.to_string(),
        entry_marker: Marker::new("#contenido_tbNumeroSolicitud"),
        layout: SheetLayout {
            columns: columns(&["#", "CODIGO", "LINK", "OBSERVACIONES"]),
            number_column: "#".to_string(),
            id_column: "CODIGO".to_string(),
            name_column: None,
            date_column: None,
            country_column: None,
            code_output: None,
            link_output: Some("LINK".to_string()),
            observation_column: "OBSERVACIONES".to_string(),
        },
        identity: IdentityRule {
            prefix: Some("52".to_string()),
            ..Default::default()
        },
        success_observation: "OK".to_string(),
        record_budget_secs: Some(60),
        modal: None,
        pages: vec![page],
    }
}

fn liquidacion(payer: &Payer) -> WizardTable {
    let mut consulta = consulta_page();
    consulta.settle_ms = 5_000;
    consulta.success = Marker::new("#contenido_rbSi");
    consulta.not_found = Some(Marker::with_text("body", MSG_NOT_FOUND));
    consulta.validation = form_errors();

    let confirmacion = PageSpec {
        name: "confirmacion".to_string(),
        ready: Marker::new("#contenido_rbSi"),
        actions: vec![Action::Click {
            selector: "#contenido_rbSi".to_string(),
        }],
        trigger: "#contenido_btnPagar".to_string(),
        settle_ms: 5_000,
        success: Marker::new("#contenido_Wizard2_rbExterior"),
        extract: None,
        not_found: None,
        challenge: None,
        validation: vec![Marker::new("#contenido_cvConfirmarTramite")],
        watch_modal: false,
    };

    let medio_pago = PageSpec {
        name: "medio_pago".to_string(),
        ready: Marker::new("#contenido_Wizard2_rbExterior"),
        actions: vec![
            Action::Click {
                selector: "#contenido_Wizard2_rbExterior".to_string(),
            },
            Action::Pause { ms: 3_000 },
            select("#contenido_Wizard2_ddlPagoEn", literal("1")),
        ],
        trigger: "#contenido_Wizard2_StepNavigationTemplateContainerID_StepNextButton".to_string(),
        settle_ms: 2_000,
        success: Marker::new("#contenido_Wizard2_ucTitularPago_ddlTipoDocumento"),
        extract: None,
        not_found: None,
        challenge: None,
        validation: form_errors(),
        watch_modal: false,
    };

    let titular = "#contenido_Wizard2_ucTitularPago";
    let datos_pago = PageSpec {
        name: "datos_pagador".to_string(),
        ready: Marker::new(format!("{}_ddlTipoDocumento", titular)),
        actions: vec![
            select(
                &format!("{}_ddlTipoDocumento", titular),
                literal(&payer.document_type),
            ),
            Action::Pause { ms: 1_000 },
            fill(
                &format!("{}_tbnumeroDocumento", titular),
                literal(&payer.document_number),
            ),
            fill(&format!("{}_tbNombres", titular), literal(&payer.full_name)),
            fill(
                &format!("{}_tbTelefonoDepositante", titular),
                literal(&payer.phone),
            ),
            fill(
                &format!("{}_ucCorreoElectronico_tbCorreoElectronico", titular),
                literal(&payer.email),
            ),
            fill(
                &format!("{}_ucCorreoElectronico_tbCorfirmCorreo", titular),
                literal(&payer.email),
            ),
        ],
        trigger: "#contenido_Wizard2_FinishNavigationTemplateContainerID_FinishButton".to_string(),
        settle_ms: 2_000,
        success: Marker::new("#contenido_Wizard2_ucInfoBanco_lbMensajeEnPopup"),
        extract: None,
        not_found: None,
        challenge: None,
        validation: form_errors(),
        watch_modal: false,
    };

    WizardTable {
        name: Workflow::Liquidacion.to_string(),
        entry_url: CONSULTA_URL.to_string(),
        entry_marker: Marker::new("#contenido_tbNumeroSolicitud"),
        layout: SheetLayout {
            columns: columns(&["#", "CODIGO", "OBSERVACIONES"]),
            number_column: "#".to_string(),
            id_column: "CODIGO".to_string(),
            name_column: None,
            date_column: None,
            country_column: None,
            code_output: None,
            link_output: None,
            observation_column: "OBSERVACIONES".to_string(),
        },
        identity: IdentityRule {
            prefix: Some("52".to_string()),
            ..Default::default()
        },
        success_observation: MSG_COMPLETED.to_string(),
        record_budget_secs: None,
        modal: None,
        pages: vec![consulta, confirmacion, medio_pago, datos_pago],
    }
}

fn solicitud() -> WizardTable {
    let inicio = PageSpec {
        name: "inicio".to_string(),
        ready: Marker::new("#contenido_ddlTipoSeleccion"),
        actions: vec![
            select("#contenido_ddlTipoSeleccion", literal("21")),
            select("#contenido_ddlTipoDocumento", literal("1")),
            Action::DismissIfPresent {
                panel: INFO_PANEL.to_string(),
                close: INFO_CLOSE.to_string(),
                wait_ms: 5_000,
            },
            check("#contenido_cbAcepto"),
        ],
        trigger: "#contenido_btnIniciar".to_string(),
        settle_ms: 0,
        success: Marker::new("#contenido_Wizard3_tbCedula"),
        extract: None,
        not_found: None,
        challenge: Some(recaptcha_challenge()),
        validation: Vec::new(),
        watch_modal: false,
    };

    let cedula = PageSpec {
        name: "cedula_correo".to_string(),
        ready: Marker::new("#contenido_Wizard3_tbCedula"),
        actions: vec![
            fill("#contenido_Wizard3_tbCedula", FieldSource::Code),
            fill(
                "#contenido_Wizard3_ucCorreoElectronico_tbCorreoElectronico",
                FieldSource::Email,
            ),
            fill(
                "#contenido_Wizard3_ucCorreoElectronico_tbCorfirmCorreo",
                FieldSource::Email,
            ),
        ],
        trigger: "#contenido_Wizard3_StartNavigationTemplateContainerID_StartNextButton"
            .to_string(),
        settle_ms: 0,
        success: Marker::new("#contenido_Wizard3_rbConFinMigratorio"),
        extract: None,
        not_found: None,
        challenge: Some(recaptcha_challenge()),
        validation: Vec::new(),
        watch_modal: true,
    };

    let fecha = PageSpec {
        name: "fecha_expedicion".to_string(),
        ready: Marker::new("#contenido_Wizard3_rbConFinMigratorio"),
        actions: vec![
            check("#contenido_Wizard3_rbConFinMigratorio"),
            check("#contenido_Wizard3_cbInformacionReservada"),
            Action::TypeDate {
                selector: "#contenido_Wizard3_tbExpedicionCedula_tbFecha".to_string(),
            },
        ],
        trigger: WIZARD3_NEXT.to_string(),
        settle_ms: 1_500,
        success: Marker::attached("#contenido_Wizard3_ucTramitePorPais_ddlPais"),
        extract: None,
        not_found: None,
        challenge: Some(recaptcha_challenge()),
        validation: Vec::new(),
        watch_modal: true,
    };

    let pais = PageSpec {
        name: "pais".to_string(),
        ready: Marker::attached("#contenido_Wizard3_ucTramitePorPais_ddlPais"),
        actions: vec![
            select(
                "#contenido_Wizard3_ucTramitePorPais_ddlPais",
                FieldSource::Country,
            ),
            Action::Pause { ms: 2_000 },
        ],
        trigger: WIZARD3_NEXT.to_string(),
        settle_ms: 0,
        success: Marker::new("#contenido_Wizard3_rbSi"),
        extract: None,
        not_found: None,
        challenge: None,
        validation: Vec::new(),
        watch_modal: true,
    };

    let confirmar = PageSpec {
        name: "confirmar".to_string(),
        ready: Marker::new("#contenido_Wizard3_rbSi"),
        actions: vec![check("#contenido_Wizard3_rbSi"), Action::Pause { ms: 1_000 }],
        trigger: WIZARD3_NEXT.to_string(),
        settle_ms: 0,
        success: Marker::new("#contenido_Wizard3_lblNumeroSolicitud"),
        extract: Some(Extraction::Code {
            selector: "#contenido_Wizard3_lblNumeroSolicitud".to_string(),
            pattern: Pattern::new(DEFAULT_CODE_PATTERN),
        }),
        not_found: None,
        challenge: Some(recaptcha_challenge()),
        validation: Vec::new(),
        watch_modal: true,
    };

    WizardTable {
        name: Workflow::Solicitud.to_string(),
        entry_url: SOLICITUD_URL.to_string(),
        entry_marker: Marker::new("#contenido_ddlTipoSeleccion"),
        layout: SheetLayout {
            columns: columns(&[
                "#",
                "NOMBRE",
                "CEDULA",
                "FECHA_EXP",
                "CODIGO",
                "LINK",
                "OBSERVACIONES",
            ]),
            number_column: "#".to_string(),
            id_column: "CEDULA".to_string(),
            name_column: Some("NOMBRE".to_string()),
            date_column: Some("FECHA_EXP".to_string()),
            country_column: None,
            code_output: Some("CODIGO".to_string()),
            link_output: Some("LINK".to_string()),
            observation_column: "OBSERVACIONES".to_string(),
        },
        identity: IdentityRule {
            prefix: None,
            min_len: 5,
            require_email: true,
            require_issue_date: true,
        },
        success_observation: MSG_COMPLETED.to_string(),
        record_budget_secs: None,
        modal: Some(ModalSpec {
            panel: INFO_PANEL.to_string(),
            message: INFO_MESSAGE.to_string(),
            close: INFO_CLOSE.to_string(),
            duplicate_keywords: vec![
                "ya existe".to_string(),
                "ya cuenta con".to_string(),
                "solicitud previa".to_string(),
                "solicitud en curso".to_string(),
            ],
            code_pattern: Pattern::new(DEFAULT_CODE_PATTERN),
        }),
        pages: vec![inicio, cedula, fecha, pais, confirmar],
    }
}
