use phf::phf_set;

pub(crate) const DISPOSABLE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "0-mail.com", "10minutemail.com", "10minutemail.net", "20minutemail.com",
    "33mail.com", "anonbox.net", "burnermail.io", "discard.email",
    "dispostable.com", "dropmail.me", "emailondeck.com", "fakeinbox.com",
    "fakemail.net", "getairmail.com", "getnada.com", "guerrillamail.biz",
    "guerrillamail.com", "guerrillamail.de", "guerrillamail.info", "guerrillamail.net",
    "guerrillamail.org", "guerrillamailblock.com", "harakirimail.com", "inboxbear.com",
    "incognitomail.org", "jetable.org", "mailcatch.com", "maildrop.cc",
    "mailexpire.com", "mailinator.com", "mailinator.net", "mailinator2.com",
    "mailnesia.com", "mailnull.com", "mailsac.com", "mintemail.com",
    "mohmal.com", "moakt.com", "mytemp.email", "mytrashmail.com",
    "nada.email", "sharklasers.com", "spam4.me", "spambox.us",
    "spamgourmet.com", "spamex.com", "tempail.com", "tempinbox.com",
    "tempmail.dev", "tempmail.net", "tempmailo.com", "temp-mail.io",
    "temp-mail.org", "tempr.email", "throwawaymail.com", "trashmail.com",
    "trashmail.de", "trashmail.net", "wegwerfmail.de", "yopmail.com",
    "yopmail.fr", "yopmail.net",
};

pub(crate) const FREE_DOMAINS: phf::Set<&'static str> = phf_set! {
    "aol.com", "att.net", "comcast.net", "email.com", "fastmail.com",
    "gmail.com", "gmx.com", "gmx.de", "gmx.net", "googlemail.com",
    "hey.com", "hotmail.co.uk", "hotmail.com", "hotmail.de", "hotmail.fr",
    "icloud.com", "inbox.com", "laposte.net", "live.com", "live.fr",
    "mac.com", "mail.com", "mail.ru", "me.com", "msn.com",
    "naver.com", "orange.fr", "outlook.com", "outlook.fr", "proton.me",
    "protonmail.com", "qq.com", "rediffmail.com", "sfr.fr", "t-online.de",
    "tutanota.com", "web.de", "yahoo.co.jp", "yahoo.co.uk", "yahoo.com",
    "yahoo.fr", "yandex.com", "yandex.ru", "ymail.com", "zoho.com",
    "163.com", "126.com",
};

pub(crate) const ROLE_NAMES: phf::Set<&'static str> = phf_set! {
    "abuse", "accounting", "accounts", "admin", "administrator", "all",
    "billing", "careers", "contact", "customercare", "customerservice", "dev",
    "devnull", "dns", "enquiries", "feedback", "finance", "help",
    "helpdesk", "hostmaster", "hr", "info", "jobs", "legal",
    "mail", "mailer-daemon", "marketing", "media", "news", "newsletter",
    "no-reply", "noc", "noreply", "office", "orders", "postmaster",
    "press", "privacy", "recruiting", "root", "sales", "security",
    "service", "staff", "support", "sysadmin", "team", "tech",
    "undisclosed-recipients", "webmaster", "www",
};
