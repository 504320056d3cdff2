use crate::services::provider::UserId;
use tonic::{Request, Status};
use x509_parser::{
    certificate::X509Certificate, der_parser::ber::BerObjectContent, oid_registry::Oid,
    traits::FromDer,
};

// subject UID attribute (0.9.2342.19200300.100.1.1)
const SUBJECT_UID: &[u64] = &[0, 9, 2342, 19200300, 100, 1, 1];

/// The authenticated caller, attached to every request by [`extract_subj_uid`].
#[derive(Clone, Debug)]
pub struct UserExtension {
    pub user_id: UserId,
}

/// A tonic interceptor service function.
///
/// Extracts the subject uid from the client certificate and adds it to the request extensions.
pub fn extract_subj_uid(mut req: Request<()>) -> Result<Request<()>, Status> {
    let user_id = {
        let client_certs = req
            .peer_certs()
            .ok_or_else(|| Status::unauthenticated("Request missing client cert"))?;
        let cert = client_certs
            .first()
            .ok_or_else(|| Status::unauthenticated("Request missing client cert"))?;
        subject_uid(cert.get_ref())?
    };
    tracing::trace!(%user_id, "authenticated client");
    req.extensions_mut().insert(UserExtension { user_id });
    Ok(req)
}

/// Reads the subject UID out of a DER encoded certificate.
fn subject_uid(der: &[u8]) -> Result<UserId, Status> {
    let (rem, cert) =
        X509Certificate::from_der(der).map_err(|_| Status::unauthenticated("Bad client cert"))?;
    if !rem.is_empty() {
        return Err(Status::unauthenticated("Bad client cert"));
    }

    let oid = Oid::from(SUBJECT_UID)
        .map_err(|_| Status::internal("subject uid oid failed to encode"))?;
    let uid = cert
        .subject()
        .iter_by_oid(&oid)
        .next()
        .ok_or_else(|| Status::unauthenticated("Client cert missing subject uid"))?;
    match uid.attr_value().content {
        BerObjectContent::UTF8String(user) => Ok(String::from(user)),
        _ => Err(Status::unauthenticated("Client cert uid must be UTF8")),
    }
}
