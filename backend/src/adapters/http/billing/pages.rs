//! HTML pages shown to payers returning from checkout.

use std::fmt::Write;

use crate::domain::billing::PaymentStatus;

/// Escapes text for element content and quoted attribute values.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const BASE_STYLE: &str = "\
body{font-family:system-ui,-apple-system,'Segoe UI',Roboto,Arial,sans-serif;margin:0;\
min-height:100vh;display:flex;align-items:center;justify-content:center;background:#f1f5f9}\
.card{background:#fff;border-radius:16px;padding:32px 28px;max-width:440px;width:92%;\
text-align:center;box-shadow:0 20px 40px rgba(15,23,42,.12)}\
h1{color:#16a34a;margin:0 0 8px}p{color:#475569}\
.info{background:#f8fafc;border-radius:10px;padding:12px;margin:18px 0;text-align:left}\
.btn{display:inline-block;background:#22c55e;color:#fff;padding:14px 26px;border-radius:999px;\
text-decoration:none;font-weight:600}";

/// What the success page reports.
#[derive(Debug, Default)]
pub struct SuccessPage<'a> {
    pub status: Option<PaymentStatus>,
    pub payment_id: Option<&'a str>,
    pub subscription_token: Option<&'a str>,
    pub whatsapp_link: Option<&'a str>,
}

impl SuccessPage<'_> {
    pub fn render(&self) -> String {
        let mut info = String::new();
        let status = match self.status {
            Some(PaymentStatus::Completed) | None => "Completado",
            Some(other) => other.as_str(),
        };
        let _ = write!(info, "<p><strong>Estado:</strong> {}</p>", html_escape(status));
        if let Some(token) = self.subscription_token {
            let _ = write!(info, "<p><strong>Token:</strong> {}</p>", html_escape(token));
        }
        if let Some(payment_id) = self.payment_id {
            let _ = write!(
                info,
                "<p><strong>ID de Pago:</strong> {}</p>",
                html_escape(payment_id)
            );
        }

        let support = match self.whatsapp_link {
            Some(link) => format!(
                "<p>Para cualquier consulta o soporte, contáctanos:</p>\
                 <a class=\"btn\" href=\"{}\" target=\"_blank\" rel=\"noopener\">Volver a Chat</a>",
                html_escape(link)
            ),
            None => String::new(),
        };

        format!(
            "<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"UTF-8\">\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
             <title>Pago Exitoso</title><style>{style}</style></head><body>\
             <div class=\"card\"><h1>¡Pago Exitoso!</h1>\
             <p>Tu suscripción ha sido activada correctamente</p>\
             <div class=\"info\">{info}</div>{support}</div></body></html>",
            style = BASE_STYLE,
            info = info,
            support = support,
        )
    }
}

/// Interstitial that forwards the visitor to a WhatsApp chat.
pub fn whatsapp_redirect(link: &str) -> String {
    let link = html_escape(link);
    format!(
        "<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"UTF-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\
         <title>Redirigiendo a WhatsApp…</title>\
         <meta http-equiv=\"refresh\" content=\"1;url={link}\">\
         <style>{style}</style></head><body><div class=\"card\">\
         <h1>Abriendo WhatsApp…</h1>\
         <p>Estamos redirigiéndote para empezar a chatear.</p>\
         <p>Si no ocurre nada, haz clic aquí:</p>\
         <a class=\"btn\" href=\"{link}\">Ir a WhatsApp</a></div></body></html>",
        link = link,
        style = BASE_STYLE,
    )
}
