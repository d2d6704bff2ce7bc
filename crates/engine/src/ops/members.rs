use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, Member, MemberRemoval, ResultEngine, expenses, members, participants,
};

use super::{Engine, normalize_member_key, normalize_required_name, with_tx};

impl Engine {
    /// Add a member to a group.
    ///
    /// Duplicate detection runs on a normalized key, so "José " and "jose"
    /// count as the same member while the display name keeps its spelling.
    pub async fn add_member(
        &self,
        group_id: &str,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<Member> {
        let name = normalize_required_name(name, "member")?;
        let name_key = normalize_member_key(&name);
        if name_key.is_empty() {
            return Err(EngineError::InvalidInput(
                "member name must contain letters or digits".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, user_id).await?;

            let exists = members::Entity::find()
                .filter(members::Column::GroupId.eq(group_id.to_string()))
                .filter(members::Column::NameNorm.eq(name_key.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name));
            }

            let member = Member::new(group_id, name, Utc::now());
            member.active_model(name_key).insert(&db_tx).await?;
            Ok(member)
        })
    }

    /// Remove a member from a group.
    ///
    /// A member referenced by any expense, as payer or participant, is
    /// deactivated instead of deleted so the history keeps resolving.
    pub async fn remove_member(
        &self,
        group_id: &str,
        member_id: &str,
        user_id: &str,
    ) -> ResultEngine<MemberRemoval> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, user_id).await?;

            let model = members::Entity::find_by_id(member_id.to_string())
                .filter(members::Column::GroupId.eq(group_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;

            let paid = expenses::Entity::find()
                .filter(expenses::Column::PayerMemberId.eq(member_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            let participated = participants::Entity::find()
                .filter(participants::Column::MemberId.eq(member_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();

            if paid || participated {
                let mut member = Member::from(model);
                member.deactivate(Utc::now());

                let entry = members::ActiveModel {
                    id: ActiveValue::Set(member.id.clone()),
                    active: ActiveValue::Set(member.active),
                    updated_at: ActiveValue::Set(member.updated_at),
                    ..Default::default()
                };
                entry.update(&db_tx).await?;
                Ok(MemberRemoval::Deactivated(member))
            } else {
                members::Entity::delete_by_id(model.id.clone())
                    .exec(&db_tx)
                    .await?;
                Ok(MemberRemoval::Deleted {
                    member_id: model.id,
                })
            }
        })
    }

    /// Every member id known to the group, active or not.
    pub(super) async fn group_member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<BTreeSet<String>> {
        let models = members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id.to_string()))
            .all(db)
            .await?;
        Ok(models.into_iter().map(|m| m.id).collect())
    }
}
