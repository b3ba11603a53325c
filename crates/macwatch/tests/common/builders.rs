//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use macwatch::db::host_repo::{self, NewHost};
use macwatch::db::job_repo::{self, NewJob};
use macwatch::model::{timestamp_now, NotificationSettings, RetentionPolicy, VlanId};
use macwatch::{Database, MacAddress};

/// Builder for a job with its hosts and whitelist.
pub struct JobBuilder {
    job: NewJob,
    hosts: Vec<NewHost>,
    whitelist: Vec<String>,
}

impl JobBuilder {
    /// A job with all notifications on and `forever` retention.
    pub fn new(name: &str) -> Self {
        Self {
            job: NewJob {
                name: name.to_string(),
                ..Default::default()
            },
            hosts: Vec::new(),
            whitelist: Vec::new(),
        }
    }

    pub fn vlan_filter(mut self, vlan: VlanId) -> Self {
        self.job.vlan_filter = Some(vlan);
        self
    }

    pub fn notifications(mut self, settings: NotificationSettings) -> Self {
        self.job.notifications = settings;
        self
    }

    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.job.retention = policy;
        self
    }

    /// Adds an enabled host; its name doubles as its address.
    pub fn host(mut self, name: &str) -> Self {
        self.hosts.push(NewHost::new(name, name));
        self
    }

    pub fn disabled_host(mut self, name: &str) -> Self {
        let mut host = NewHost::new(name, name);
        host.enabled = false;
        self.hosts.push(host);
        self
    }

    pub fn whitelist(mut self, mac: &str) -> Self {
        self.whitelist.push(mac.to_string());
        self
    }

    /// Inserts the job, its hosts and whitelist; returns the job id.
    pub fn create(self, db: &Database) -> i64 {
        db.transaction(|tx| {
            let job_id = job_repo::insert(tx, &self.job, timestamp_now())?;
            for host in &self.hosts {
                host_repo::insert(tx, job_id, host)?;
            }
            for mac in &self.whitelist {
                let mac = MacAddress::parse(mac).expect("invalid whitelist MAC in test");
                job_repo::add_to_whitelist(tx, job_id, &mac)?;
            }
            Ok(job_id)
        })
        .expect("Failed to create test job")
    }
}

/// Renders rows as Catalyst-style `show mac address-table` output.
pub fn mac_table(rows: &[(VlanId, &str, &str)]) -> String {
    let mut out = String::from(
        "          Mac Address Table\n\
         -------------------------------------------\n\
         \n\
         Vlan    Mac Address       Type        Ports\n\
         ----    -----------       --------    -----\n",
    );
    for (vlan, mac, interface) in rows {
        out.push_str(&format!(" {:>4}    {}    DYNAMIC     {}\n", vlan, mac, interface));
    }
    out.push_str(&format!(
        "Total Mac Addresses for this criterion: {}\n",
        rows.len()
    ));
    out
}

pub fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).expect("invalid MAC in test")
}
