//! Wire types for the REST API.
//!
//! Requests convert into core inputs; responses are built from core records. Field names are
//! snake_case. Money is always written as a decimal string with two fractional digits, ids as
//! 32-character lowercase hex strings, dates as `YYYY-MM-DD` and timestamps as RFC 3339 UTC.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secu_core::models::{
    Account, Consultation, ConsultationInput, ConsultationUpdate, DoctorInput, DoctorProfile,
    Gender, InsuredInput, InsuredProfile, Media, PaymentMethod, Person, PersonInput,
    Prescription, PrescriptionInput, PrescriptionKind, Reimbursement, Role,
};
use secu_core::repositories::{
    ConsultationStats, ReimbursementBreakdown, ReimbursementStats, RegisterInput,
};
use secu_core::{RecordId, ReimbursementStatus};
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

fn money<S: Serializer>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{amount:.2}"))
}

// ---------------------------------------------------------------------------
// Persons

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct PersonReq {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "FEMALE")]
    pub gender: Option<Gender>,
    pub address: String,
    pub phone: String,
    pub email: String,
}

impl From<PersonReq> for PersonInput {
    fn from(req: PersonReq) -> Self {
        PersonInput {
            last_name: req.last_name,
            first_name: req.first_name,
            birth_date: req.birth_date,
            gender: req.gender,
            address: req.address,
            phone: req.phone,
            email: req.email,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct PersonRes {
    #[schema(value_type = String)]
    pub id: RecordId,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: NaiveDate,
    #[schema(value_type = String, example = "FEMALE")]
    pub gender: Gender,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub has_photo: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Person> for PersonRes {
    fn from(p: Person) -> Self {
        PersonRes {
            has_photo: p.photo_id.is_some(),
            id: p.id,
            last_name: p.last_name.into_inner(),
            first_name: p.first_name.into_inner(),
            birth_date: p.birth_date,
            gender: p.gender,
            address: p.address.into_inner(),
            phone: p.phone.to_string(),
            email: p.email.to_string(),
            created_at: p.created_at,
        }
    }
}

/// Stored photo metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct PhotoRes {
    #[schema(value_type = String)]
    pub id: RecordId,
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub original_filename: String,
    pub hash: String,
    pub stored_at: DateTime<Utc>,
}

impl From<Media> for PhotoRes {
    fn from(m: Media) -> Self {
        PhotoRes {
            id: m.id,
            media_type: m.file.media_type.map(|t| t.into_inner()),
            size_bytes: m.file.size_bytes,
            original_filename: m.file.original_filename.into_inner(),
            hash: m.file.hash.as_str().to_owned(),
            stored_at: m.file.stored_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Insured

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct InsuredReq {
    #[serde(flatten)]
    pub person: PersonReq,
    pub insurance_number: String,
    #[schema(value_type = Option<String>, example = "BANK_TRANSFER")]
    pub payment_method: Option<PaymentMethod>,
}

impl From<InsuredReq> for InsuredInput {
    fn from(req: InsuredReq) -> Self {
        InsuredInput {
            person: req.person.into(),
            insurance_number: req.insurance_number,
            payment_method: req.payment_method,
        }
    }
}

/// Person fields plus payment method; the insurance number cannot change.
#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct InsuredUpdateReq {
    #[serde(flatten)]
    pub person: PersonReq,
    #[schema(value_type = Option<String>, example = "CASH")]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct InsuredRes {
    #[serde(flatten)]
    pub person: PersonRes,
    pub insurance_number: String,
    #[schema(value_type = String, example = "BANK_TRANSFER")]
    pub payment_method: PaymentMethod,
    #[schema(value_type = Option<String>)]
    pub referring_doctor_id: Option<RecordId>,
}

impl From<InsuredProfile> for InsuredRes {
    fn from(profile: InsuredProfile) -> Self {
        InsuredRes {
            person: profile.person.into(),
            insurance_number: profile.insured.insurance_number.to_string(),
            payment_method: profile.insured.payment_method,
            referring_doctor_id: profile.insured.referring_doctor_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Doctors

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct DoctorReq {
    #[serde(flatten)]
    pub person: PersonReq,
    /// Blank or absent for a generalist.
    pub specialization: Option<String>,
}

impl From<DoctorReq> for DoctorInput {
    fn from(req: DoctorReq) -> Self {
        DoctorInput {
            person: req.person.into(),
            specialization: req.specialization,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct SpecializationReq {
    pub specialization: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct DoctorRes {
    #[serde(flatten)]
    pub person: PersonRes,
    pub specialization: Option<String>,
    pub generalist: bool,
}

impl From<DoctorProfile> for DoctorRes {
    fn from(profile: DoctorProfile) -> Self {
        DoctorRes {
            generalist: profile.doctor.is_generalist(),
            person: profile.person.into(),
            specialization: profile.doctor.specialization.map(|s| s.into_inner()),
        }
    }
}

// ---------------------------------------------------------------------------
// Prescriptions

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct PrescriptionReq {
    #[schema(value_type = Option<String>, example = "MEDICATION")]
    pub kind: Option<PrescriptionKind>,
    pub medication_details: Option<String>,
    #[schema(value_type = Option<String>)]
    pub specialist_id: Option<RecordId>,
}

impl From<PrescriptionReq> for PrescriptionInput {
    fn from(req: PrescriptionReq) -> Self {
        PrescriptionInput {
            kind: req.kind,
            medication_details: req.medication_details,
            specialist_id: req.specialist_id,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct CreatePrescriptionReq {
    #[schema(value_type = String)]
    pub consultation_id: RecordId,
    #[serde(flatten)]
    pub prescription: PrescriptionReq,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct PrescriptionRes {
    #[schema(value_type = String)]
    pub id: RecordId,
    #[schema(value_type = String)]
    pub consultation_id: RecordId,
    #[schema(value_type = String, example = "SPECIALIST_REFERRAL")]
    pub kind: PrescriptionKind,
    pub medication_details: Option<String>,
    #[schema(value_type = Option<String>)]
    pub specialist_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
}

impl From<Prescription> for PrescriptionRes {
    fn from(p: Prescription) -> Self {
        PrescriptionRes {
            id: p.id,
            consultation_id: p.consultation_id,
            kind: p.kind,
            medication_details: p.medication_details.map(|d| d.into_inner()),
            specialist_id: p.specialist_id,
            created_at: p.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Consultations

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct ConsultationReq {
    #[schema(value_type = String)]
    pub insured_id: RecordId,
    #[schema(value_type = String)]
    pub doctor_id: RecordId,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, example = "25.00")]
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
    /// Issued together with the consultation; only generalists may prescribe.
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionReq>,
}

impl ConsultationReq {
    pub fn into_parts(self) -> (ConsultationInput, Vec<PrescriptionInput>) {
        let input = ConsultationInput {
            insured_id: self.insured_id,
            doctor_id: self.doctor_id,
            date: self.date,
            cost: self.cost,
            notes: self.notes,
        };
        let prescriptions = self.prescriptions.into_iter().map(Into::into).collect();
        (input, prescriptions)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct ConsultationUpdateReq {
    pub date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, example = "30.00")]
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
}

impl From<ConsultationUpdateReq> for ConsultationUpdate {
    fn from(req: ConsultationUpdateReq) -> Self {
        ConsultationUpdate {
            date: req.date,
            cost: req.cost,
            notes: req.notes,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ConsultationRes {
    #[schema(value_type = String)]
    pub id: RecordId,
    pub date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub insured_id: RecordId,
    #[schema(value_type = String)]
    pub doctor_id: RecordId,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "25.00")]
    pub cost: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Consultation> for ConsultationRes {
    fn from(c: Consultation) -> Self {
        ConsultationRes {
            id: c.id,
            date: c.date,
            insured_id: c.insured_id,
            doctor_id: c.doctor_id,
            cost: c.cost,
            notes: c.notes,
            created_at: c.created_at,
        }
    }
}

/// A newly recorded consultation with what was created alongside it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ConsultationCreatedRes {
    pub consultation: ConsultationRes,
    pub prescriptions: Vec<PrescriptionRes>,
    pub reimbursement: Option<ReimbursementRes>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ConsultationStatsRes {
    pub total: usize,
    pub with_generalist: usize,
    pub with_specialist: usize,
}

impl From<ConsultationStats> for ConsultationStatsRes {
    fn from(s: ConsultationStats) -> Self {
        ConsultationStatsRes {
            total: s.total,
            with_generalist: s.with_generalist,
            with_specialist: s.with_specialist,
        }
    }
}

// ---------------------------------------------------------------------------
// Reimbursements

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct ReimbursementReq {
    #[schema(value_type = String)]
    pub consultation_id: RecordId,
    /// Defaults to the insured's payment method.
    #[schema(value_type = Option<String>, example = "CASH")]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ReimbursementRes {
    #[schema(value_type = String)]
    pub id: RecordId,
    #[schema(value_type = String)]
    pub consultation_id: RecordId,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "20.00")]
    pub amount: Decimal,
    #[schema(value_type = String, example = "BANK_TRANSFER")]
    pub payment_method: PaymentMethod,
    #[schema(value_type = String, example = "PENDING")]
    pub status: ReimbursementStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub refusal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Reimbursement> for ReimbursementRes {
    fn from(r: Reimbursement) -> Self {
        ReimbursementRes {
            id: r.id,
            consultation_id: r.consultation_id,
            amount: r.amount,
            payment_method: r.payment_method,
            status: r.status,
            processed_at: r.processed_at,
            refusal_reason: r.refusal_reason,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ReimbursementStatsRes {
    pub total: usize,
    pub pending: usize,
    pub processed: usize,
    pub refused: usize,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String)]
    pub processed_amount: Decimal,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String)]
    pub pending_amount: Decimal,
}

impl From<ReimbursementStats> for ReimbursementStatsRes {
    fn from(s: ReimbursementStats) -> Self {
        ReimbursementStatsRes {
            total: s.total,
            pending: s.pending,
            processed: s.processed,
            refused: s.refused,
            processed_amount: s.processed_amount,
            pending_amount: s.pending_amount,
        }
    }
}

/// Amount, rate and what the insured still pays.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct BreakdownRes {
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "50.00")]
    pub cost: Decimal,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "40.00")]
    pub amount: Decimal,
    #[schema(value_type = String, example = "0.80")]
    pub rate: Decimal,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "80.00")]
    pub percentage: Decimal,
    #[serde(serialize_with = "money")]
    #[schema(value_type = String, example = "10.00")]
    pub out_of_pocket: Decimal,
}

impl From<ReimbursementBreakdown> for BreakdownRes {
    fn from(b: ReimbursementBreakdown) -> Self {
        BreakdownRes {
            cost: b.cost,
            amount: b.amount,
            rate: b.rate,
            percentage: b.percentage,
            out_of_pocket: b.out_of_pocket,
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct RegisterReq {
    pub username: String,
    pub password: String,
    /// Role names, with or without a `ROLE_` prefix. Defaults to `USER`.
    #[serde(default)]
    pub roles: Vec<String>,
    #[schema(value_type = Option<String>)]
    pub person_id: Option<RecordId>,
}

impl RegisterReq {
    /// Parses role names; an empty list means `USER`.
    pub fn into_input(self) -> Result<RegisterInput, secu_core::CoreError> {
        let mut roles = self
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()?;
        if roles.is_empty() {
            roles.push(Role::User);
        }
        Ok(RegisterInput {
            username: self.username,
            password: self.password,
            roles,
            person_id: self.person_id,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, ToSchema)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct TokenRes {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub username: String,
    #[schema(value_type = Vec<String>, example = json!(["USER"]))]
    pub roles: Vec<Role>,
}

impl TokenRes {
    pub fn bearer(token: String, expires_in: u64, account: &Account) -> Self {
        TokenRes {
            token,
            token_type: "Bearer".into(),
            expires_in,
            username: account.username.to_string(),
            roles: account.roles.iter().copied().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalars

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, ToSchema)]
pub struct CountRes {
    pub count: usize,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, ToSchema)]
pub struct ExistsRes {
    pub exists: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, ToSchema)]
pub struct FlagRes {
    pub value: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reimbursement(amount: Decimal) -> Reimbursement {
        Reimbursement {
            id: RecordId::new(),
            consultation_id: RecordId::new(),
            amount,
            payment_method: PaymentMethod::Cash,
            status: ReimbursementStatus::Pending,
            processed_at: None,
            refusal_reason: None,
            created_at: Utc::now(),
            version: 3,
        }
    }

    #[test]
    fn test_money_has_two_decimals() {
        let res = ReimbursementRes::from(reimbursement(dec!(100)));
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["amount"], "100.00");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["payment_method"], "CASH");
        assert!(json.get("version").is_none());

        let res = ReimbursementRes::from(reimbursement(dec!(40.5)));
        assert_eq!(serde_json::to_value(&res).unwrap()["amount"], "40.50");
    }

    #[test]
    fn test_insured_request_is_flat() {
        let req: InsuredReq = serde_json::from_value(serde_json::json!({
            "last_name": "Martin",
            "first_name": "Claire",
            "birth_date": "1985-04-12",
            "gender": "FEMALE",
            "address": "1 rue de la Paix, Paris",
            "phone": "+33612345678",
            "email": "claire.martin@example.fr",
            "insurance_number": "2850475123456",
            "payment_method": "BANK_TRANSFER"
        }))
        .unwrap();
        let input = InsuredInput::from(req);
        assert_eq!(input.person.last_name, "Martin");
        assert_eq!(input.person.gender, Some(Gender::Female));
        assert_eq!(input.payment_method, Some(PaymentMethod::BankTransfer));
    }

    #[test]
    fn test_cost_accepts_string_or_number() {
        let doctor = RecordId::new();
        let insured = RecordId::new();
        for cost in [serde_json::json!("25.50"), serde_json::json!(25.5)] {
            let req: ConsultationReq = serde_json::from_value(serde_json::json!({
                "insured_id": insured.to_string(),
                "doctor_id": doctor.to_string(),
                "cost": cost,
            }))
            .unwrap();
            let (input, prescriptions) = req.into_parts();
            assert_eq!(input.cost, Some(dec!(25.5)));
            assert!(prescriptions.is_empty());
        }
    }

    #[test]
    fn test_register_roles() {
        let req = RegisterReq {
            username: "camille".into(),
            password: "long enough".into(),
            roles: vec!["ROLE_DOCTOR".into(), "user".into()],
            person_id: None,
        };
        let input = req.into_input().unwrap();
        assert_eq!(input.roles, vec![Role::Doctor, Role::User]);

        let defaulted = RegisterReq::default().into_input().unwrap();
        assert_eq!(defaulted.roles, vec![Role::User]);

        let bad = RegisterReq {
            roles: vec!["SUPERUSER".into()],
            ..RegisterReq::default()
        };
        assert!(bad.into_input().is_err());
    }
}
