//! Serializable types shared by the unit tests.

use crate::error::AccessError;
use crate::model::{Bytes, FieldValue, ObjectRef, Value};
use crate::schema::{ClassBuilder, Serializable};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: i32,
}

impl Serializable for Person {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Person")
            .blank_default()
            .field("name", |p| &p.name, |p| &mut p.name)
            .field("age", |p| &p.age, |p| &mut p.age);
    }
}

/// A later revision of [`Person`] with an extra field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonV2 {
    pub name: String,
    pub age: i32,
    pub email: Option<String>,
}

impl Serializable for PersonV2 {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Person")
            .blank_default()
            .field("name", |p| &p.name, |p| &mut p.name)
            .field("age", |p| &p.age, |p| &mut p.age)
            .field("email", |p| &p.email, |p| &mut p.email);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Named {
    pub name: String,
}

impl Serializable for Named {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Named")
            .blank_default()
            .field("name", |n| &n.name, |n| &mut n.name);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub base: Named,
    pub price: i64,
}

impl Serializable for Item {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Item")
            .blank_default()
            .extends(|i| &i.base, |i| &mut i.base)
            .field("price", |i| &i.price, |i| &mut i.price);
    }
}

/// Declares its own `name`, shadowing the ancestor's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tagged {
    pub base: Named,
    pub name: String,
    pub tag: String,
}

impl Serializable for Tagged {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Tagged")
            .blank_default()
            .extends(|t| &t.base, |t| &mut t.base)
            .field("name", |t| &t.name, |t| &mut t.name)
            .field("tag", |t| &t.tag, |t| &mut t.tag);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Serializable for Order {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Order")
            .constants([Order::Ascending, Order::Descending], |o| *o as usize);
    }
}

/// Reads and writes `balance` through methods; `get_owner` upper-cases and
/// `set_balance` rejects negative amounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub owner: String,
    pub balance: i64,
    /// Number of `set_balance` calls, not serialized.
    pub audit: u32,
}

impl Serializable for Account {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Account")
            .blank_default()
            .field("owner", |a| &a.owner, |a| &mut a.owner)
            .field("balance", |a| &a.balance, |a| &mut a.balance)
            .getter("get_owner", |a| Value::Text(a.owner.to_uppercase()))
            .getter("get_balance", |a| Value::Int(a.balance))
            .setter("set_balance", |a, value| {
                let balance = i64::from_value(value)?;
                if balance < 0 {
                    return Err(AccessError::Rejected(format!("negative balance {balance}")));
                }
                a.balance = balance;
                a.audit += 1;
                Ok(())
            });
    }
}

#[derive(Debug, Default)]
pub struct Link {
    pub label: String,
    pub next: Option<ObjectRef>,
}

impl Serializable for Link {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Link")
            .blank_default()
            .field("label", |l| &l.label, |l| &mut l.label)
            .field("next", |l| &l.next, |l| &mut l.next);
    }
}

#[derive(Debug, Default)]
pub struct Pair {
    pub left: Option<ObjectRef>,
    pub right: Option<ObjectRef>,
}

impl Serializable for Pair {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Pair")
            .blank_default()
            .field("left", |p| &p.left, |p| &mut p.left)
            .field("right", |p| &p.right, |p| &mut p.right);
    }
}

#[derive(Debug, Default)]
pub struct Team {
    pub lead: Option<ObjectRef>,
    pub members: Vec<ObjectRef>,
}

impl Serializable for Team {
    fn describe(class: &mut ClassBuilder<Self>) {
        class
            .name("demo.Team")
            .blank_default()
            .field("lead", |t| &t.lead, |t| &mut t.lead)
            .field("members", |t| &t.members, |t| &mut t.members);
    }
}

/// Self-describing: reading bumps `hits` by one.
#[derive(Debug, Default)]
pub struct Counter {
    pub label: String,
    pub hits: u64,
}

impl Serializable for Counter {
    fn describe(class: &mut ClassBuilder<Self>) {
        class.name("demo.Counter").blank_default().self_describing(
            |counter, encoder| {
                encoder.write_as(&counter.label)?;
                encoder.writer().write_varint(counter.hits);
                Ok(())
            },
            |counter, decoder| {
                counter.label = decoder.read_as("counter label")?;
                counter.hits = decoder.reader().read_varint("counter hits")? + 1;
                Ok(())
            },
        );
    }
}

/// Self-describing, with references written through the shared identity
/// stack.
#[derive(Debug, Default)]
pub struct Holder {
    pub me: Option<ObjectRef>,
    pub friend: Option<ObjectRef>,
    pub friend2: Option<ObjectRef>,
    pub payload: Bytes,
}

impl Serializable for Holder {
    fn describe(class: &mut ClassBuilder<Self>) {
        class.name("demo.Holder").blank_default().self_describing(
            |holder, encoder| {
                encoder.write_as(&holder.me)?;
                encoder.write_as(&holder.friend)?;
                encoder.write_as(&holder.friend2)?;
                encoder.write_as(&holder.payload)
            },
            |holder, decoder| {
                holder.me = decoder.read_as("holder self")?;
                holder.friend = decoder.read_as("holder friend")?;
                holder.friend2 = decoder.read_as("holder friend")?;
                holder.payload = decoder.read_as("holder payload")?;
                Ok(())
            },
        );
    }
}
