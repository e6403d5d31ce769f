mod common;

use std::sync::Arc;
use std::time::Duration;

use apostilla_wizard::models::presets::{CONSULTA_URL, MSG_RECORD_TIMEOUT, SOLICITUD_URL};
use apostilla_wizard::models::{preset, Extracted, Payer, RowResult, Workflow};
use apostilla_wizard::workflow::row_flow::{MSG_DUPLICATE_WITHOUT_CODE, MSG_ENTRY_UNAVAILABLE};
use apostilla_wizard::{AppError, FlowSettings, InputRecord, RowCtx, RowFlow};

use common::{person, record, DeadSite, Event, FakeSite, Screen};

// consulta
const ENTRY: &str = "#contenido_tbNumeroSolicitud";
const SEARCH: &str = "#contenido_btnBuscar";
const RESULT_LINK: &str = "#contenido_ucInfor_lblMensajes2 a";
const CAPTCHA: &str = "#contenido_validadorCaptcha";
const DOC_URL: &str =
    "https://tramites.cancilleria.gov.co/apostillalegalizacion/documento.aspx?id=77";

// solicitud
const START: &str = "#contenido_ddlTipoSeleccion";
const START_BUTTON: &str = "#contenido_btnIniciar";
const CEDULA: &str = "#contenido_Wizard3_tbCedula";
const CEDULA_NEXT: &str = "#contenido_Wizard3_StartNavigationTemplateContainerID_StartNextButton";
const MIGRATORY: &str = "#contenido_Wizard3_rbConFinMigratorio";
const DATE_FIELD: &str = "#contenido_Wizard3_tbExpedicionCedula_tbFecha";
const COUNTRY: &str = "#contenido_Wizard3_ucTramitePorPais_ddlPais";
const CONFIRM: &str = "#contenido_Wizard3_rbSi";
const NEXT: &str = "#contenido_Wizard3_StepNavigationTemplateContainerID_StepNextButton";
const REQUEST_NUMBER: &str = "#contenido_Wizard3_lblNumeroSolicitud";
const INFO_PANEL: &str = "#contenido_ucInfor_panInformmacion";
const INFO_MESSAGE: &str = "#contenido_ucInfor_lbMensajeEnPopup";
const INFO_CLOSE: &str = "#contenido_ucInfor_lbClose";

// liquidacion
const CONFIRM_YES: &str = "#contenido_rbSi";
const PAY: &str = "#contenido_btnPagar";
const CONFIRM_VALIDATOR: &str = "#contenido_cvConfirmarTramite";
const ABROAD: &str = "#contenido_Wizard2_rbExterior";
const PAY_IN: &str = "#contenido_Wizard2_ddlPagoEn";
const PAY_NEXT: &str = "#contenido_Wizard2_StepNavigationTemplateContainerID_StepNextButton";
const PAYER_DOC_TYPE: &str = "#contenido_Wizard2_ucTitularPago_ddlTipoDocumento";
const PAYER_DOC_NUMBER: &str = "#contenido_Wizard2_ucTitularPago_tbnumeroDocumento";
const FINISH: &str = "#contenido_Wizard2_FinishNavigationTemplateContainerID_FinishButton";
const BANK_INFO: &str = "#contenido_Wizard2_ucInfoBanco_lbMensajeEnPopup";

fn flow(workflow: Workflow, settings: FlowSettings) -> RowFlow {
    RowFlow::new(Arc::new(preset(workflow, &Payer::default())), settings)
}

fn ctx(record: &InputRecord) -> RowCtx {
    RowCtx::new(1, record, 1, 1)
}

/// consulta 站点：入口页常驻，点击搜索时交给 `on_search` 决定结果
fn consulta_site(mut on_search: impl FnMut(usize, &mut Screen) + Send + 'static) -> FakeSite {
    let mut searches = 0;
    FakeSite::new(move |event, screen| match event {
        Event::Goto(url) if url == CONSULTA_URL => screen.replace(&[ENTRY]),
        Event::Click(s) if s == SEARCH => {
            searches += 1;
            on_search(searches, screen);
        }
        _ => {}
    })
}

fn show_captcha(screen: &mut Screen) {
    screen.replace(&[ENTRY, CAPTCHA]);
}

/// 回发返回带链接的新页面
fn show_document(screen: &mut Screen) {
    screen.replace(&[ENTRY]);
    screen.show(RESULT_LINK);
    screen
        .attrs
        .insert((RESULT_LINK.to_string(), "href".to_string()), DOC_URL.to_string());
}

/// solicitud 站点
///
/// - `accepted_date`: 网站接受的日期输入
/// - `final_modal`: 最后一步弹出的提示，`None` 时给出申请编号
/// - `backs_to_entry`: 后退几次回到入口页，`None` 表示永远回不去
fn solicitud_site(
    accepted_date: &'static str,
    final_modal: Option<&'static str>,
    backs_to_entry: Option<usize>,
) -> FakeSite {
    let mut backs = 0;
    FakeSite::new(move |event, screen| match event {
        Event::Goto(url) if url == SOLICITUD_URL => screen.replace(&[START]),
        Event::Click(s) if s == START_BUTTON => screen.replace(&[CEDULA]),
        Event::Click(s) if s == CEDULA_NEXT => screen.replace(&[MIGRATORY]),
        Event::Click(s) if s == INFO_CLOSE => {
            screen.hide(INFO_PANEL);
            screen.hide(INFO_MESSAGE);
            screen.texts.remove(INFO_MESSAGE);
        }
        Event::Click(s) if s == NEXT => {
            if screen.visible.contains(MIGRATORY) {
                if screen.fields.get(DATE_FIELD).map(String::as_str) == Some(accepted_date) {
                    screen.replace(&[]);
                    screen.attached.insert(COUNTRY.to_string());
                } else {
                    screen.show(INFO_PANEL);
                    screen.show_text(INFO_MESSAGE, "La fecha de expedición no es válida");
                }
            } else if screen.attached.contains(COUNTRY) {
                screen.replace(&[CONFIRM]);
            } else if screen.visible.contains(CONFIRM) {
                match final_modal {
                    Some(text) => {
                        screen.show(INFO_PANEL);
                        screen.show_text(INFO_MESSAGE, text);
                    }
                    None => {
                        screen.show_text(REQUEST_NUMBER, "Su número de solicitud es 52012345678")
                    }
                }
            }
        }
        Event::Back => {
            backs += 1;
            if backs_to_entry == Some(backs) {
                screen.replace(&[START]);
            }
        }
        _ => {}
    })
}

/// liquidacion 站点在哪一步拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Accepted,
    /// 查询页上出现 `.alert-danger`
    Search,
    /// 确认页的校验器
    Confirmation,
}

fn payer() -> Payer {
    Payer {
        document_type: "2".to_string(),
        document_number: "900123456".to_string(),
        full_name: "Apostillamos SAS".to_string(),
        phone: "3001234567".to_string(),
        email: "pagos@apostillamos.co".to_string(),
    }
}

fn liquidacion_flow() -> RowFlow {
    let table = preset(Workflow::Liquidacion, &payer());
    RowFlow::new(Arc::new(table), FlowSettings::default())
}

fn liquidacion_site(rejection: Rejection) -> FakeSite {
    FakeSite::new(move |event, screen| match event {
        Event::Goto(url) if url == CONSULTA_URL => screen.replace(&[ENTRY]),
        Event::Click(s) if s == SEARCH => {
            if rejection == Rejection::Search {
                screen.reload();
                screen.show_text(".alert-danger", "El código de solicitud no es válido");
            } else {
                screen.replace(&[CONFIRM_YES]);
            }
        }
        Event::Click(s) if s == PAY => {
            if rejection == Rejection::Confirmation {
                screen.reload();
                screen.show_text(CONFIRM_VALIDATOR, "Debe confirmar el trámite");
            } else {
                screen.replace(&[ABROAD]);
            }
        }
        Event::Click(s) if s == PAY_NEXT => screen.replace(&[PAYER_DOC_TYPE]),
        Event::Click(s) if s == FINISH => {
            screen.replace(&[]);
            screen.show_text(BANK_INFO, "Realice el pago en la entidad bancaria");
        }
        Event::Back => screen.replace(&[ENTRY]),
        _ => {}
    })
}

#[tokio::test(start_paused = true)]
async fn invalid_code_never_touches_the_browser() {
    let site = FakeSite::new(|_, _| {});
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "4912345");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(
        result,
        RowResult::InvalidInput("Código inválido o no inicia con 52".to_string())
    );
    assert!(site.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_code_is_reported_without_navigation() {
    let site = FakeSite::new(|_, _| {});
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(3, "");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::InvalidInput("Código vacío".to_string()));
    assert!(site.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn consult_returns_document_link() {
    let site = consulta_site(|_, screen| show_document(screen));
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Link(DOC_URL.to_string())));
    assert_eq!(site.count(|e| matches!(e, Event::Goto(_))), 1);
    assert_eq!(site.field(ENTRY).as_deref(), Some("5212345678"));
    assert_eq!(site.clicks(SEARCH), 1);
}

#[tokio::test(start_paused = true)]
async fn consult_reports_not_found() {
    let site = consulta_site(|_, screen| {
        screen.reload();
        screen.show_text("body", "Resultado: No se han encontrado registros para el código")
    });
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::NotFound);
}

#[tokio::test(start_paused = true)]
async fn three_challenges_in_a_row_mean_antibot() {
    let site = consulta_site(|_, screen| show_captcha(screen));
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::AntibotSuspected);
    assert_eq!(site.clicks(SEARCH), 3);
    // 无害点击发生在每次重试之前
    assert_eq!(site.clicks("h1"), 2);
}

#[tokio::test(start_paused = true)]
async fn challenge_passes_on_retry() {
    let site = consulta_site(|n, screen| {
        if n == 1 {
            show_captcha(screen);
        } else {
            show_document(screen);
        }
    });
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Link(DOC_URL.to_string())));
    assert_eq!(site.clicks(SEARCH), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_postback_is_not_judged_by_the_old_page() {
    let site = consulta_site(|n, screen| {
        screen.defer(Duration::from_millis(300), move |s| {
            if n < 3 {
                show_captcha(s);
            } else {
                show_document(s);
            }
        });
    });
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Link(DOC_URL.to_string())));
    assert_eq!(site.clicks(SEARCH), 3);
    assert_eq!(site.clicks("h1"), 2);
}

#[tokio::test(start_paused = true)]
async fn lost_execution_context_during_postback_keeps_waiting() {
    let site = consulta_site(|_, screen| {
        show_document(screen);
        screen.glitches = 1;
    });
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Link(DOC_URL.to_string())));
    assert_eq!(site.clicks(SEARCH), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_after_a_challenge_is_still_retried() {
    let site = consulta_site(|n, screen| match n {
        1 => show_captcha(screen),
        2 => screen.replace(&[ENTRY]),
        _ => show_document(screen),
    });
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Link(DOC_URL.to_string())));
    assert_eq!(site.clicks(SEARCH), 3);
    assert_eq!(site.clicks("h1"), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_page_times_out_after_retries() {
    let site = consulta_site(|_, _| {});
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    match result {
        RowResult::Error(msg) => assert!(msg.contains("consulta"), "{}", msg),
        other => panic!("expected timeout error, got {:?}", other),
    }
    assert_eq!(site.clicks(SEARCH), 3);
}

#[tokio::test(start_paused = true)]
async fn record_budget_bounds_the_whole_record() {
    let site = consulta_site(|_, _| {});
    let settings = FlowSettings {
        record_budget: Some(Duration::from_secs(10)),
        ..FlowSettings::default()
    };
    let flow = flow(Workflow::Consulta, settings);
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Error(MSG_RECORD_TIMEOUT.to_string()));
}

#[tokio::test(start_paused = true)]
async fn missing_entry_page_is_a_record_error() {
    let site = FakeSite::new(|_, _| {});
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Error(MSG_ENTRY_UNAVAILABLE.to_string()));
}

#[tokio::test(start_paused = true)]
async fn unreachable_site_is_a_session_failure() {
    let flow = flow(Workflow::Consulta, FlowSettings::default());
    let rec = record(0, "5212345678");

    let err = flow.process(&DeadSite, &rec, &ctx(&rec)).await.unwrap_err();

    assert!(matches!(err, AppError::Session { session: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn request_completes_all_pages() {
    let site = solicitud_site("08061997", None, None);
    let flow = flow(Workflow::Solicitud, FlowSettings::default());
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Code("52012345678".to_string())));
    assert_eq!(site.field(CEDULA).as_deref(), Some("1020304050"));
    assert!(site
        .events()
        .contains(&Event::Select(COUNTRY.to_string(), "173".to_string())));
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_day_first_date_falls_back_to_month_first() {
    let site = solicitud_site("06081997", None, None);
    let flow = flow(Workflow::Solicitud, FlowSettings::default());
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Code("52012345678".to_string())));
    let typed: Vec<String> = site
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Type(s, v) if s == DATE_FIELD => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(typed, vec!["08061997", "06081997"]);
}

#[tokio::test(start_paused = true)]
async fn every_date_rejected_is_invalid_input() {
    let site = solicitud_site("01011900", None, None);
    let flow = flow(Workflow::Solicitud, FlowSettings::default());
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert!(matches!(result, RowResult::InvalidInput(_)));
    assert_eq!(site.count(|e| matches!(e, Event::Type(..))), 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_modal_yields_code_and_returns_to_entry() {
    let site = solicitud_site(
        "08061997",
        Some("Ya existe una solicitud en curso con el número 52098765432"),
        Some(3),
    );
    let flow = flow(Workflow::Solicitud, FlowSettings::default());
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Code("52098765432".to_string())));
    assert_eq!(site.clicks(INFO_CLOSE), 1);
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 3);
}

#[tokio::test(start_paused = true)]
async fn back_navigation_cap_still_terminates() {
    let site = solicitud_site(
        "08061997",
        Some("El documento no se puede tramitar en este momento"),
        None,
    );
    let settings = FlowSettings {
        back_cap: 4,
        ..FlowSettings::default()
    };
    let flow = flow(Workflow::Solicitud, settings);
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(
        result,
        RowResult::InvalidInput("El documento no se puede tramitar en este momento".to_string())
    );
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 4);
}

#[tokio::test(start_paused = true)]
async fn duplicate_without_code_is_an_error() {
    let site = solicitud_site(
        "08061997",
        Some("Ya existe una solicitud en curso para esta cédula"),
        Some(3),
    );
    let flow = flow(Workflow::Solicitud, FlowSettings::default());
    let rec = person(0, "1020304050", "08061997");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Error(MSG_DUPLICATE_WITHOUT_CODE.to_string()));
    assert_eq!(site.clicks(INFO_CLOSE), 1);
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 3);
}

#[tokio::test(start_paused = true)]
async fn payment_runs_through_every_page() {
    let site = liquidacion_site(Rejection::Accepted);
    let flow = liquidacion_flow();
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(result, RowResult::Success(Extracted::Code("5212345678".to_string())));
    let events = site.events();
    assert!(events.contains(&Event::Click(CONFIRM_YES.to_string())));
    assert!(events.contains(&Event::Select(PAY_IN.to_string(), "1".to_string())));
    assert!(events.contains(&Event::Select(PAYER_DOC_TYPE.to_string(), "2".to_string())));
    assert_eq!(site.field(PAYER_DOC_NUMBER).as_deref(), Some("900123456"));
    assert_eq!(site.clicks(FINISH), 1);
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 0);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_payment_is_rejected_and_backs_out() {
    let site = liquidacion_site(Rejection::Confirmation);
    let flow = liquidacion_flow();
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(
        result,
        RowResult::InvalidInput("Debe confirmar el trámite".to_string())
    );
    assert_eq!(site.clicks(PAY_NEXT), 0);
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 1);
}

#[tokio::test(start_paused = true)]
async fn rejection_on_the_entry_page_needs_no_back() {
    let site = liquidacion_site(Rejection::Search);
    let flow = liquidacion_flow();
    let rec = record(0, "5212345678");

    let result = flow.process(&site, &rec, &ctx(&rec)).await.unwrap();

    assert_eq!(
        result,
        RowResult::InvalidInput("El código de solicitud no es válido".to_string())
    );
    assert_eq!(site.clicks(PAY), 0);
    assert_eq!(site.count(|e| matches!(e, Event::Back)), 0);
}
